use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use gbk_client::{ClientConfig, ClientError, StoreClient};

type Handler = fn(usize, Vec<Vec<u8>>, &mut TcpStream);

/// Accepts one connection and feeds `expected_commands` commands to `handler`.
fn spawn_server(expected_commands: usize, handler: Handler) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        for idx in 0..expected_commands {
            let args = read_command(&mut reader).expect("read command");
            handler(idx, args, &mut stream);
        }
    });

    addr
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<Vec<u8>>> {
    let count = read_prefixed(reader, b'*')?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_prefixed(reader, b'$')?;
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data)?;
        if !data.ends_with(b"\r\n") {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "missing crlf"));
        }
        data.truncate(len);
        args.push(data);
    }
    Ok(args)
}

fn read_prefixed(reader: &mut BufReader<TcpStream>, marker: u8) -> std::io::Result<usize> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    }
    let line = line.trim_end();
    if line.as_bytes().first() != Some(&marker) {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad marker"));
    }
    line[1..]
        .parse()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "bad length"))
}

fn write_raw(stream: &mut TcpStream, raw: &[u8]) {
    let _ = stream.write_all(raw);
    let _ = stream.flush();
}

fn write_bulk(stream: &mut TcpStream, data: &[u8]) {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    write_raw(stream, &out);
}

fn client_with_addr(addr: String) -> StoreClient {
    StoreClient::with_config(ClientConfig {
        addr,
        max_idle: 1,
        max_total: 1,
        read_timeout: Some(Duration::from_secs(1)),
        write_timeout: Some(Duration::from_secs(1)),
        connect_timeout: Some(Duration::from_secs(1)),
    })
}

#[test]
fn rpush_then_lrange_reuses_one_connection() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args, vec![b"RPUSH".to_vec(), b"guestbook".to_vec(), b"hello".to_vec()]);
            write_raw(stream, b":3\r\n");
        } else {
            assert_eq!(
                args,
                vec![b"LRANGE".to_vec(), b"guestbook".to_vec(), b"0".to_vec(), b"-1".to_vec()]
            );
            write_raw(stream, b"*3\r\n$2\r\nhi\r\n$3\r\nyo!\r\n$5\r\nhello\r\n");
        }
    });

    let client = client_with_addr(addr);
    assert_eq!(client.rpush("guestbook", "hello").expect("rpush"), 3);
    let members = client.lrange_all("guestbook").expect("lrange");
    assert_eq!(members, vec!["hi", "yo!", "hello"]);
    assert_eq!(client.pool().idle_count(), 1);
}

#[test]
fn missing_list_reads_as_empty() {
    let addr = spawn_server(1, |_, _, stream| write_raw(stream, b"*0\r\n"));
    let client = client_with_addr(addr);
    assert!(client.lrange_all("nothing").expect("lrange").is_empty());
}

#[test]
fn info_returns_raw_bulk() {
    let addr = spawn_server(1, |_, args, stream| {
        assert_eq!(args, vec![b"INFO".to_vec()]);
        write_bulk(stream, b"# Replication\r\nrole:master\r\n");
    });
    let client = client_with_addr(addr);
    assert_eq!(
        client.info().expect("info"),
        b"# Replication\r\nrole:master\r\n".to_vec()
    );
}

#[test]
fn password_is_sent_with_auth_before_first_command() {
    let addr = spawn_server(2, |idx, args, stream| {
        if idx == 0 {
            assert_eq!(args, vec![b"AUTH".to_vec(), b"secret".to_vec()]);
            write_raw(stream, b"+OK\r\n");
        } else {
            assert_eq!(args, vec![b"PING".to_vec()]);
            write_raw(stream, b"+PONG\r\n");
        }
    });
    let client = client_with_addr(format!("secret@{}", addr));
    assert_eq!(client.ping().expect("ping"), b"PONG".to_vec());
}

#[test]
fn rejected_auth_fails_acquire() {
    let addr = spawn_server(1, |_, _, stream| {
        write_raw(stream, b"-WRONGPASS invalid username-password pair\r\n");
    });
    let client = client_with_addr(format!("nope@{}", addr));
    match client.ping() {
        Err(ClientError::Server { message }) => assert!(message.starts_with(b"WRONGPASS")),
        other => panic!("expected server error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn server_error_reply_is_surfaced() {
    let addr = spawn_server(1, |_, _, stream| {
        write_raw(stream, b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n");
    });
    let client = client_with_addr(addr);
    assert!(matches!(
        client.rpush("k", "v"),
        Err(ClientError::Server { .. })
    ));
}

#[test]
fn failed_connection_is_not_returned_to_pool() {
    let addr = spawn_server(1, |_, _, stream| write_raw(stream, b"?garbage\r\n"));
    let client = client_with_addr(addr);
    assert!(matches!(client.info(), Err(ClientError::Protocol(_))));
    assert_eq!(client.pool().idle_count(), 0);
}

#[test]
fn unresolved_address_fails_per_request() {
    let client = StoreClient::connect("");
    assert!(matches!(
        client.lrange_all("guestbook"),
        Err(ClientError::InvalidAddress(_))
    ));
}

#[test]
fn closed_pool_rejects_requests() {
    let addr = spawn_server(1, |_, _, stream| write_raw(stream, b"+PONG\r\n"));
    let client = client_with_addr(addr);
    client.ping().expect("ping");
    client.pool().close_all();
    assert_eq!(client.pool().idle_count(), 0);
    assert!(matches!(client.ping(), Err(ClientError::PoolClosed)));
}
