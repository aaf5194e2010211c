//! In-process RESP2 server for integration tests: a small in-memory store
//! speaking just enough of the protocol to exercise the client, including
//! MULTI/EXEC/WATCH bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use redical::resp::{encode_frame, parse_frame, Frame};

enum Entry {
    Str { data: Vec<u8>, expire_ms: Option<i64> },
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    Zset(HashMap<String, f64>),
}

#[derive(Default)]
struct Store {
    data: HashMap<String, Entry>,
    versions: HashMap<String, u64>,
}

impl Store {
    fn bump(&mut self, key: &str) {
        *self.versions.entry(key.to_string()).or_insert(0) += 1;
    }

    fn version(&self, key: &str) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }
}

pub struct TestServer {
    addr: std::net::SocketAddr,
    accept_handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test server");
        let addr = listener.local_addr().expect("failed to get local address");
        let store = Arc::new(Mutex::new(Store::default()));

        let accept_handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, _)) => {
                        let store = Arc::clone(&store);
                        tokio::spawn(async move {
                            let _ = process(socket, store).await;
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        TestServer { addr, accept_handle }
    }

    pub fn uri(&self) -> String {
        format!("redis://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.accept_handle.abort();
    }
}

struct Session {
    /// Key versions captured by WATCH
    watched: Vec<(String, u64)>,
    /// Commands queued since MULTI, or None outside a transaction
    queue: Option<Vec<Vec<Vec<u8>>>>,
    queue_error: bool,
}

async fn process(mut socket: TcpStream, store: Arc<Mutex<Store>>) -> std::io::Result<()> {
    let mut session = Session {
        watched: Vec::new(),
        queue: None,
        queue_error: false,
    };
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let mut pos = 0;
        while let Ok(Some((frame, len))) = parse_frame(&buffer[pos..]) {
            pos += len;
            let response = dispatch(&mut session, frame, &store);
            socket.write_all(&encode_frame(&response).expect("encode")).await?;
        }
        buffer.drain(..pos);

        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
}

fn frame_args(frame: Frame) -> Option<Vec<Vec<u8>>> {
    match frame {
        Frame::Array(items) => {
            let mut args = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Frame::BulkString(data) => args.push(data),
                    _ => return None,
                }
            }
            Some(args)
        }
        _ => None,
    }
}

fn ok() -> Frame {
    Frame::SimpleString("OK".into())
}

fn error(message: &str) -> Frame {
    Frame::Error(message.to_string())
}

fn wrongtype() -> Frame {
    error("WRONGTYPE Operation against a key holding the wrong kind of value")
}

fn text(arg: &[u8]) -> String {
    String::from_utf8_lossy(arg).into_owned()
}

const KNOWN_COMMANDS: &[&str] = &[
    "PING", "SELECT", "FLUSHDB", "DBSIZE", "GET", "SET", "DEL", "EXISTS", "INCR", "TTL",
    "PTTL", "HSET", "HGET", "HGETALL", "HMGET", "HDEL", "SADD", "SREM", "SISMEMBER",
    "SMEMBERS", "SSCAN", "ZADD", "ZCARD", "ZSCORE", "ZREM", "ZRANGE", "MULTI", "EXEC",
    "DISCARD", "WATCH", "UNWATCH",
];

fn dispatch(session: &mut Session, frame: Frame, store: &Arc<Mutex<Store>>) -> Frame {
    let args = match frame_args(frame) {
        Some(args) if !args.is_empty() => args,
        _ => return error("ERR protocol error: expected a command array"),
    };
    let name = text(&args[0]).to_uppercase();

    // queue everything but transaction control while in MULTI
    if session.queue.is_some() && !matches!(name.as_str(), "EXEC" | "DISCARD" | "MULTI") {
        if !KNOWN_COMMANDS.contains(&name.as_str()) {
            session.queue_error = true;
            return error(&format!("ERR unknown command '{}'", name));
        }
        session
            .queue
            .as_mut()
            .expect("queue checked above")
            .push(args);
        return Frame::SimpleString("QUEUED".into());
    }

    match name.as_str() {
        "MULTI" => {
            if session.queue.is_some() {
                return error("ERR MULTI calls can not be nested");
            }
            session.queue = Some(Vec::new());
            session.queue_error = false;
            ok()
        }
        "EXEC" => {
            let queued = match session.queue.take() {
                Some(queued) => queued,
                None => return error("ERR EXEC without MULTI"),
            };
            if session.queue_error {
                session.queue_error = false;
                session.watched.clear();
                return error("EXECABORT Transaction discarded because of previous errors.");
            }
            let conflict = {
                let store = store.lock().unwrap();
                session
                    .watched
                    .iter()
                    .any(|(key, version)| store.version(key) != *version)
            };
            session.watched.clear();
            if conflict {
                return Frame::Null;
            }
            let results = queued
                .into_iter()
                .map(|args| run(args, store))
                .collect::<Vec<Frame>>();
            Frame::Array(results)
        }
        "DISCARD" => {
            if session.queue.take().is_none() {
                return error("ERR DISCARD without MULTI");
            }
            session.queue_error = false;
            session.watched.clear();
            ok()
        }
        "WATCH" => {
            let store = store.lock().unwrap();
            for key in args.iter().skip(1) {
                let key = text(key);
                let version = store.version(&key);
                session.watched.push((key, version));
            }
            ok()
        }
        "UNWATCH" => {
            session.watched.clear();
            ok()
        }
        _ => run(args, store),
    }
}

fn run(args: Vec<Vec<u8>>, store: &Arc<Mutex<Store>>) -> Frame {
    let name = text(&args[0]).to_uppercase();
    let mut store = store.lock().unwrap();
    match name.as_str() {
        "PING" => match args.get(1) {
            Some(message) => Frame::BulkString(message.clone()),
            None => Frame::SimpleString("PONG".into()),
        },
        "SELECT" => ok(),
        "FLUSHDB" => {
            let keys: Vec<String> = store.data.keys().cloned().collect();
            for key in keys {
                store.bump(&key);
            }
            store.data.clear();
            ok()
        }
        "DBSIZE" => Frame::Integer(store.data.len() as i64),
        "GET" => {
            let key = text(&args[1]);
            match store.data.get(&key) {
                Some(Entry::Str { data, .. }) => Frame::BulkString(data.clone()),
                Some(_) => wrongtype(),
                None => Frame::Null,
            }
        }
        "SET" => run_set(&args, &mut store),
        "DEL" => {
            let mut removed = 0;
            for key in args.iter().skip(1) {
                let key = text(key);
                if store.data.remove(&key).is_some() {
                    store.bump(&key);
                    removed += 1;
                }
            }
            Frame::Integer(removed)
        }
        "EXISTS" => {
            let count = args
                .iter()
                .skip(1)
                .filter(|key| store.data.contains_key(&text(key)))
                .count();
            Frame::Integer(count as i64)
        }
        "INCR" => {
            let key = text(&args[1]);
            let current = match store.data.get(&key) {
                Some(Entry::Str { data, .. }) => match std::str::from_utf8(data)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                {
                    Some(n) => n,
                    None => return error("ERR value is not an integer or out of range"),
                },
                Some(_) => return wrongtype(),
                None => 0,
            };
            let next = current + 1;
            store.data.insert(
                key.clone(),
                Entry::Str {
                    data: next.to_string().into_bytes(),
                    expire_ms: None,
                },
            );
            store.bump(&key);
            Frame::Integer(next)
        }
        "TTL" | "PTTL" => {
            let key = text(&args[1]);
            match store.data.get(&key) {
                None => Frame::Integer(-2),
                Some(Entry::Str {
                    expire_ms: Some(ms),
                    ..
                }) => {
                    if name == "TTL" {
                        Frame::Integer(ms / 1000)
                    } else {
                        Frame::Integer(*ms)
                    }
                }
                Some(_) => Frame::Integer(-1),
            }
        }
        "HSET" => {
            let key = text(&args[1]);
            let entry = store
                .data
                .entry(key.clone())
                .or_insert_with(|| Entry::Hash(HashMap::new()));
            let hash = match entry {
                Entry::Hash(hash) => hash,
                _ => return wrongtype(),
            };
            let mut added = 0;
            let mut iter = args[2..].iter();
            while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
                if hash.insert(text(field), text(value)).is_none() {
                    added += 1;
                }
            }
            store.bump(&key);
            Frame::Integer(added)
        }
        "HGET" => {
            let key = text(&args[1]);
            match store.data.get(&key) {
                Some(Entry::Hash(hash)) => match hash.get(&text(&args[2])) {
                    Some(value) => Frame::BulkString(value.clone().into_bytes()),
                    None => Frame::Null,
                },
                Some(_) => wrongtype(),
                None => Frame::Null,
            }
        }
        "HGETALL" => {
            let key = text(&args[1]);
            match store.data.get(&key) {
                Some(Entry::Hash(hash)) => {
                    let mut items = Vec::with_capacity(hash.len() * 2);
                    for (field, value) in hash {
                        items.push(Frame::BulkString(field.clone().into_bytes()));
                        items.push(Frame::BulkString(value.clone().into_bytes()));
                    }
                    Frame::Array(items)
                }
                Some(_) => wrongtype(),
                None => Frame::Array(Vec::new()),
            }
        }
        "HMGET" => {
            let key = text(&args[1]);
            let hash = match store.data.get(&key) {
                Some(Entry::Hash(hash)) => Some(hash),
                Some(_) => return wrongtype(),
                None => None,
            };
            let items = args[2..]
                .iter()
                .map(|field| match hash.and_then(|h| h.get(&text(field))) {
                    Some(value) => Frame::BulkString(value.clone().into_bytes()),
                    None => Frame::Null,
                })
                .collect();
            Frame::Array(items)
        }
        "HDEL" => {
            let key = text(&args[1]);
            match store.data.get_mut(&key) {
                Some(Entry::Hash(hash)) => {
                    let removed = args[2..]
                        .iter()
                        .filter(|field| hash.remove(&text(field)).is_some())
                        .count();
                    store.bump(&key);
                    Frame::Integer(removed as i64)
                }
                Some(_) => wrongtype(),
                None => Frame::Integer(0),
            }
        }
        "SADD" => {
            let key = text(&args[1]);
            let entry = store
                .data
                .entry(key.clone())
                .or_insert_with(|| Entry::Set(HashSet::new()));
            let set = match entry {
                Entry::Set(set) => set,
                _ => return wrongtype(),
            };
            let added = args[2..]
                .iter()
                .filter(|member| set.insert(text(member)))
                .count();
            store.bump(&key);
            Frame::Integer(added as i64)
        }
        "SREM" => {
            let key = text(&args[1]);
            match store.data.get_mut(&key) {
                Some(Entry::Set(set)) => {
                    let removed = args[2..]
                        .iter()
                        .filter(|member| set.remove(&text(member)))
                        .count();
                    store.bump(&key);
                    Frame::Integer(removed as i64)
                }
                Some(_) => wrongtype(),
                None => Frame::Integer(0),
            }
        }
        "SISMEMBER" => {
            let key = text(&args[1]);
            match store.data.get(&key) {
                Some(Entry::Set(set)) => {
                    Frame::Integer(if set.contains(&text(&args[2])) { 1 } else { 0 })
                }
                Some(_) => wrongtype(),
                None => Frame::Integer(0),
            }
        }
        "SMEMBERS" => {
            let key = text(&args[1]);
            match store.data.get(&key) {
                Some(Entry::Set(set)) => Frame::Array(
                    set.iter()
                        .map(|member| Frame::BulkString(member.clone().into_bytes()))
                        .collect(),
                ),
                Some(_) => wrongtype(),
                None => Frame::Array(Vec::new()),
            }
        }
        "SSCAN" => run_sscan(&args, &store),
        "ZADD" => run_zadd(&args, &mut store),
        "ZCARD" => {
            let key = text(&args[1]);
            match store.data.get(&key) {
                Some(Entry::Zset(zset)) => Frame::Integer(zset.len() as i64),
                Some(_) => wrongtype(),
                None => Frame::Integer(0),
            }
        }
        "ZSCORE" => {
            let key = text(&args[1]);
            match store.data.get(&key) {
                Some(Entry::Zset(zset)) => match zset.get(&text(&args[2])) {
                    Some(score) => Frame::BulkString(score.to_string().into_bytes()),
                    None => Frame::Null,
                },
                Some(_) => wrongtype(),
                None => Frame::Null,
            }
        }
        "ZREM" => {
            let key = text(&args[1]);
            match store.data.get_mut(&key) {
                Some(Entry::Zset(zset)) => {
                    let removed = args[2..]
                        .iter()
                        .filter(|member| zset.remove(&text(member)).is_some())
                        .count();
                    store.bump(&key);
                    Frame::Integer(removed as i64)
                }
                Some(_) => wrongtype(),
                None => Frame::Integer(0),
            }
        }
        "ZRANGE" => run_zrange(&args, &store),
        _ => error(&format!("ERR unknown command '{}'", name)),
    }
}

fn run_set(args: &[Vec<u8>], store: &mut Store) -> Frame {
    let key = text(&args[1]);
    let value = args[2].clone();
    let mut condition: Option<&str> = None;
    let mut expire_ms: Option<i64> = None;
    let mut keep_ttl = false;

    let mut iter = args[3..].iter();
    while let Some(flag) = iter.next() {
        match text(flag).to_uppercase().as_str() {
            "NX" => condition = Some("NX"),
            "XX" => condition = Some("XX"),
            "KEEPTTL" => keep_ttl = true,
            "EX" => match iter.next().map(|v| text(v)).and_then(|v| v.parse::<i64>().ok()) {
                Some(secs) => expire_ms = Some(secs * 1000),
                None => return error("ERR syntax error"),
            },
            "PX" => match iter.next().map(|v| text(v)).and_then(|v| v.parse::<i64>().ok()) {
                Some(ms) => expire_ms = Some(ms),
                None => return error("ERR syntax error"),
            },
            _ => return error("ERR syntax error"),
        }
    }

    let exists = store.data.contains_key(&key);
    if condition == Some("NX") && exists {
        return Frame::Null;
    }
    if condition == Some("XX") && !exists {
        return Frame::Null;
    }

    if keep_ttl && expire_ms.is_none() {
        if let Some(Entry::Str {
            expire_ms: previous,
            ..
        }) = store.data.get(&key)
        {
            expire_ms = *previous;
        }
    }

    store.data.insert(
        key.clone(),
        Entry::Str {
            data: value,
            expire_ms,
        },
    );
    store.bump(&key);
    ok()
}

fn run_sscan(args: &[Vec<u8>], store: &Store) -> Frame {
    let key = text(&args[1]);
    let cursor: usize = match text(&args[2]).parse() {
        Ok(cursor) => cursor,
        Err(_) => return error("ERR invalid cursor"),
    };
    let mut pattern: Option<String> = None;
    let mut count: usize = 10;
    let mut iter = args[3..].iter();
    while let Some(flag) = iter.next() {
        match text(flag).to_uppercase().as_str() {
            "MATCH" => match iter.next() {
                Some(p) => pattern = Some(text(p)),
                None => return error("ERR syntax error"),
            },
            "COUNT" => match iter.next().map(|v| text(v)).and_then(|v| v.parse().ok()) {
                Some(n) => count = n,
                None => return error("ERR syntax error"),
            },
            _ => return error("ERR syntax error"),
        }
    }

    let mut members: Vec<String> = match store.data.get(&key) {
        Some(Entry::Set(set)) => set.iter().cloned().collect(),
        Some(_) => return wrongtype(),
        None => Vec::new(),
    };
    members.sort();

    let page: Vec<String> = members.iter().skip(cursor).take(count).cloned().collect();
    let next_cursor = if cursor + page.len() >= members.len() {
        0
    } else {
        cursor + page.len()
    };

    let elements = page
        .into_iter()
        .filter(|member| match &pattern {
            Some(pattern) => glob_match(pattern, member),
            None => true,
        })
        .map(|member| Frame::BulkString(member.into_bytes()))
        .collect();

    Frame::Array(vec![
        Frame::BulkString(next_cursor.to_string().into_bytes()),
        Frame::Array(elements),
    ])
}

fn run_zadd(args: &[Vec<u8>], store: &mut Store) -> Frame {
    let key = text(&args[1]);
    let mut condition: Option<&str> = None;
    let mut score_policy: Option<&str> = None;
    let mut changed_mode = false;
    let mut incr_mode = false;

    let mut index = 2;
    while index < args.len() {
        match text(&args[index]).to_uppercase().as_str() {
            "NX" => condition = Some("NX"),
            "XX" => condition = Some("XX"),
            "GT" => score_policy = Some("GT"),
            "LT" => score_policy = Some("LT"),
            "CH" => changed_mode = true,
            "INCR" => incr_mode = true,
            _ => break,
        }
        index += 1;
    }

    let mut pairs: Vec<(f64, String)> = Vec::new();
    while index + 1 < args.len() {
        let score: f64 = match text(&args[index]).parse() {
            Ok(score) => score,
            Err(_) => return error("ERR value is not a valid float"),
        };
        pairs.push((score, text(&args[index + 1])));
        index += 2;
    }
    if pairs.is_empty() || index != args.len() {
        return error("ERR syntax error");
    }

    let entry = store
        .data
        .entry(key.clone())
        .or_insert_with(|| Entry::Zset(HashMap::new()));
    let zset = match entry {
        Entry::Zset(zset) => zset,
        _ => return wrongtype(),
    };

    if incr_mode {
        let (score, member) = pairs.remove(0);
        let existing = zset.get(&member).copied();
        if condition == Some("NX") && existing.is_some() {
            return Frame::Null;
        }
        if condition == Some("XX") && existing.is_none() {
            return Frame::Null;
        }
        let next = existing.unwrap_or(0.0) + score;
        zset.insert(member, next);
        store.bump(&key);
        return Frame::BulkString(next.to_string().into_bytes());
    }

    let mut added = 0;
    let mut changed = 0;
    for (score, member) in pairs {
        let existing = zset.get(&member).copied();
        match existing {
            None => {
                if condition == Some("XX") {
                    continue;
                }
                zset.insert(member, score);
                added += 1;
                changed += 1;
            }
            Some(current) => {
                if condition == Some("NX") {
                    continue;
                }
                let allowed = match score_policy {
                    Some("GT") => score > current,
                    Some("LT") => score < current,
                    _ => true,
                };
                if allowed && (score - current).abs() > f64::EPSILON {
                    zset.insert(member, score);
                    changed += 1;
                }
            }
        }
    }
    store.bump(&key);
    Frame::Integer(if changed_mode { changed } else { added })
}

fn run_zrange(args: &[Vec<u8>], store: &Store) -> Frame {
    let key = text(&args[1]);
    let start: i64 = match text(&args[2]).parse() {
        Ok(n) => n,
        Err(_) => return error("ERR value is not an integer or out of range"),
    };
    let stop: i64 = match text(&args[3]).parse() {
        Ok(n) => n,
        Err(_) => return error("ERR value is not an integer or out of range"),
    };
    let mut rev = false;
    let mut with_scores = false;
    for flag in &args[4..] {
        match text(flag).to_uppercase().as_str() {
            "REV" => rev = true,
            "WITHSCORES" => with_scores = true,
            _ => return error("ERR syntax error"),
        }
    }

    let mut members: Vec<(String, f64)> = match store.data.get(&key) {
        Some(Entry::Zset(zset)) => zset.iter().map(|(m, s)| (m.clone(), *s)).collect(),
        Some(_) => return wrongtype(),
        None => Vec::new(),
    };
    members.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    if rev {
        members.reverse();
    }

    let len = members.len() as i64;
    let resolve = |index: i64| if index < 0 { len + index } else { index };
    let start = resolve(start).max(0);
    let stop = resolve(stop).min(len - 1);
    if start > stop || start >= len {
        return Frame::Array(Vec::new());
    }

    let mut items = Vec::new();
    for (member, score) in &members[start as usize..=stop as usize] {
        items.push(Frame::BulkString(member.clone().into_bytes()));
        if with_scores {
            items.push(Frame::BulkString(score.to_string().into_bytes()));
        }
    }
    Frame::Array(items)
}

/// Minimal glob: only `*` wildcards, anchored at both ends.
fn glob_match(pattern: &str, target: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == target;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !target.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == parts.len() - 1 {
            return target.len() >= pos + part.len() && target.ends_with(part);
        } else {
            match target[pos..].find(part) {
                Some(found) => pos += found + part.len(),
                None => return false,
            }
        }
    }
    true
}
