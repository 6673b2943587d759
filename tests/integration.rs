use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rax_nfs::auth::{IdentityStore, Sha256Verifier};
use rax_nfs::config::{GatewayConfig, NamingConfig};
use rax_nfs::error::{ErrorKind, NfsError};
use rax_nfs::protocol::{Command, Reply, parse_command};
use rax_nfs::storage::wire::{StorageRequest, execute};
use rax_nfs::storage::{
    ByteRange, ContentHandle, DiskStorage, MemoryStorage, RemoteStorage, StorageEngine,
    WriteOffset,
};
use rax_nfs::{Credentials, Gateway, NamingServer, Server, StorageServer};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

async fn start_naming_with(
    config: NamingConfig,
    storage: Arc<dyn StorageEngine>,
) -> (String, Arc<NamingServer>) {
    let identities = IdentityStore::new(Arc::new(Sha256Verifier), config.max_username_length);
    let naming = Arc::new(NamingServer::new(&config, identities, storage));
    let server = Server::bind(config, Arc::clone(&naming)).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    tokio::spawn(server.run());
    (addr, naming)
}

async fn start_naming_on(port: u16, max_clients: usize, storage: Arc<dyn StorageEngine>) -> String {
    let config = NamingConfig {
        port,
        max_clients,
        ..NamingConfig::default()
    };
    start_naming_with(config, storage).await.0
}

async fn start_naming() -> String {
    start_naming_on(0, 100, Arc::new(MemoryStorage::new())).await
}

fn gateway(addr: &str) -> Gateway {
    Gateway::new(
        addr,
        GatewayConfig {
            max_retries: 5,
            retry_delay_ms: 50,
            connect_timeout_secs: 2,
        },
    )
}

async fn register(gateway: &Gateway, name: &str) -> Credentials {
    let credentials = Credentials::new(name, format!("{name}-secret"));
    let command = Command::Register {
        username: credentials.username.clone(),
        password: credentials.password.clone(),
    };
    gateway.execute(&credentials, &command).await.unwrap();
    credentials
}

async fn run(gateway: &Gateway, credentials: &Credentials, line: &str) -> Result<Reply, NfsError> {
    gateway.execute(credentials, &parse_command(line)?).await
}

fn assert_kind(result: Result<Reply, NfsError>, kind: ErrorKind, words: &str) {
    let err = result.unwrap_err();
    assert_eq!(err.kind(), kind, "{err}");
    assert!(err.to_string().to_lowercase().contains(words), "{err}");
}

#[tokio::test]
async fn create_then_read_returns_exact_content() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;

    let reply = run(&gw, &alice, "CREATE notes.txt \"This is a test file content.\"")
        .await
        .unwrap();
    assert!(reply.message.contains("created successfully"));
    let reply = run(&gw, &alice, "READ notes.txt").await.unwrap();
    assert_eq!(reply.text(), "This is a test file content.");

    let awkward = "quotes \" backslash \\ tab\t crlf\r\n end\n";
    let create = Command::Create {
        path: "awkward.txt".into(),
        content: awkward.into(),
    };
    gw.execute(&alice, &create).await.unwrap();
    let reply = run(&gw, &alice, "READ awkward.txt").await.unwrap();
    assert_eq!(reply.text(), awkward);

    run(&gw, &alice, "CREATE empty.txt").await.unwrap();
    assert_eq!(run(&gw, &alice, "READ empty.txt").await.unwrap().text(), "");
}

#[tokio::test]
async fn viewfolder_is_stable_without_mutation() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;
    run(&gw, &alice, "CREATEFOLDER projects").await.unwrap();
    run(&gw, &alice, "CREATE projects/b.txt \"b\"").await.unwrap();
    run(&gw, &alice, "CREATE projects/a.txt \"a\"").await.unwrap();
    run(&gw, &alice, "CREATEFOLDER projects/archive").await.unwrap();

    let first = run(&gw, &alice, "VIEWFOLDER projects").await.unwrap().text();
    let second = run(&gw, &alice, "VIEWFOLDER projects").await.unwrap().text();
    assert_eq!(first, second);
    assert_eq!(first, "a.txt\narchive/\nb.txt");

    let root = run(&gw, &alice, "VIEWFOLDER /").await.unwrap().text();
    assert!(root.lines().any(|l| l == "projects/"));
}

#[tokio::test]
async fn addaccess_grants_read_without_changing_content() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;
    let bob = register(&gw, "bob").await;
    run(&gw, &alice, "CREATE shared.txt \"for bob\"").await.unwrap();

    assert_kind(
        run(&gw, &bob, "READ shared.txt").await,
        ErrorKind::PermissionDenied,
        "permission",
    );
    run(&gw, &alice, "ADDACCESS shared.txt bob READ").await.unwrap();
    assert_eq!(run(&gw, &bob, "READ shared.txt").await.unwrap().text(), "for bob");
    assert_eq!(run(&gw, &alice, "READ shared.txt").await.unwrap().text(), "for bob");

    // Granting twice is harmless; READ does not allow writing
    run(&gw, &alice, "ADDACCESS shared.txt bob READ").await.unwrap();
    assert_kind(
        run(&gw, &bob, "WRITE shared.txt -1 \"x\"").await,
        ErrorKind::PermissionDenied,
        "permission",
    );
    run(&gw, &alice, "ADDACCESS shared.txt bob WRITE").await.unwrap();
    run(&gw, &bob, "WRITE shared.txt -1 \"!\"").await.unwrap();
    assert_eq!(run(&gw, &alice, "READ shared.txt").await.unwrap().text(), "for bob!");
}

#[tokio::test]
async fn concurrent_appends_each_land_exactly_once() {
    const WRITERS: usize = 20;
    let addr = start_naming().await;
    let gw = Arc::new(gateway(&addr));
    let alice = register(&gw, "alice").await;
    run(&gw, &alice, "CREATE log.txt \"Initial line\\n\"").await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..WRITERS {
        let gw = Arc::clone(&gw);
        let alice = alice.clone();
        tasks.push(tokio::spawn(async move {
            run(&gw, &alice, &format!("WRITE log.txt -1 \"Line from thread {i}\\n\""))
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let text = run(&gw, &alice, "READ log.txt").await.unwrap().text();
    let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), WRITERS + 1, "{text}");
    assert_eq!(lines[0], "Initial line");
    for i in 0..WRITERS {
        let expected = format!("Line from thread {i}");
        assert_eq!(lines.iter().filter(|l| **l == expected).count(), 1, "{text}");
    }
}

#[tokio::test]
async fn move_keeps_content_owner_and_acl() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;
    let bob = register(&gw, "bob").await;
    run(&gw, &alice, "CREATE a.txt \"moving day\"").await.unwrap();
    run(&gw, &alice, "ADDACCESS a.txt bob READ").await.unwrap();

    run(&gw, &alice, "MOVE a.txt b.txt").await.unwrap();
    assert_kind(run(&gw, &alice, "READ a.txt").await, ErrorKind::NotFound, "not found");
    assert_eq!(run(&gw, &alice, "READ b.txt").await.unwrap().text(), "moving day");
    assert_eq!(run(&gw, &bob, "READ b.txt").await.unwrap().text(), "moving day");

    let info = run(&gw, &alice, "INFO b.txt").await.unwrap().text();
    assert!(info.contains("Owner: alice"), "{info}");
    assert!(info.contains("bob (R)"), "{info}");

    run(&gw, &alice, "CREATE c.txt \"taken\"").await.unwrap();
    assert_kind(
        run(&gw, &alice, "MOVE b.txt c.txt").await,
        ErrorKind::AlreadyExists,
        "already exists",
    );
}

#[tokio::test]
async fn copies_are_independent() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;
    run(&gw, &alice, "CREATE a.txt \"original\"").await.unwrap();

    run(&gw, &alice, "COPY a.txt b.txt").await.unwrap();
    run(&gw, &alice, "WRITE b.txt 0 \"CHANGED!\"").await.unwrap();
    run(&gw, &alice, "WRITE b.txt -1 \" and more\"").await.unwrap();

    assert_eq!(run(&gw, &alice, "READ a.txt").await.unwrap().text(), "original");
    assert_eq!(
        run(&gw, &alice, "READ b.txt").await.unwrap().text(),
        "CHANGED! and more"
    );

    run(&gw, &alice, "DELETE a.txt").await.unwrap();
    assert!(run(&gw, &alice, "READ b.txt").await.is_ok());

    // A reader's copy is the reader's own file
    let bob = register(&gw, "bob").await;
    run(&gw, &alice, "ADDACCESS b.txt bob READ").await.unwrap();
    run(&gw, &bob, "COPY b.txt bobs.txt").await.unwrap();
    let info = run(&gw, &bob, "INFO bobs.txt").await.unwrap().text();
    assert!(info.contains("Owner: bob"), "{info}");
    run(&gw, &bob, "WRITE bobs.txt -1 \"!\"").await.unwrap();
    assert_kind(
        run(&gw, &alice, "READ bobs.txt").await,
        ErrorKind::PermissionDenied,
        "permission",
    );
}

#[tokio::test]
async fn deleted_paths_are_gone() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;
    run(&gw, &alice, "CREATE doomed.txt \"bye\"").await.unwrap();

    run(&gw, &alice, "DELETE doomed.txt").await.unwrap();
    assert_kind(run(&gw, &alice, "READ doomed.txt").await, ErrorKind::NotFound, "not found");
    assert_kind(run(&gw, &alice, "DELETE doomed.txt").await, ErrorKind::NotFound, "not found");

    // The name is free again
    run(&gw, &alice, "CREATE doomed.txt \"back\"").await.unwrap();
    assert_eq!(run(&gw, &alice, "READ doomed.txt").await.unwrap().text(), "back");
}

#[tokio::test]
async fn unknown_paths_are_not_found_for_everyone() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;

    for line in [
        "READ nonexistent.txt",
        "DELETE nonexistent.txt",
        "INFO nonexistent.txt",
        "WRITE nonexistent.txt -1 \"x\"",
        "VIEWFOLDER nowhere",
        "CREATE nowhere/file.txt \"x\"",
    ] {
        assert_kind(run(&gw, &alice, line).await, ErrorKind::NotFound, "not found");
    }
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    register(&gw, "alice").await;

    let impostor = Credentials::new("alice", "guess");
    assert_kind(run(&gw, &impostor, "VIEW").await, ErrorKind::Unauthenticated, "unauthorized");
    let ghost = Credentials::new("ghost", "boo");
    assert_kind(run(&gw, &ghost, "LIST").await, ErrorKind::Unauthenticated, "unauthorized");

    let again = Command::Register {
        username: "alice".into(),
        password: "other".into(),
    };
    let err = gw.execute(&impostor, &again).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn raw_connection_must_log_in_first() {
    let addr = start_naming().await;
    let stream = TcpStream::connect(&addr).await.unwrap();
    let mut stream = BufReader::new(stream);

    stream.get_mut().write_all(b"READ a.txt\r\n").await.unwrap();
    let mut header = String::new();
    stream.read_line(&mut header).await.unwrap();
    assert!(header.starts_with("530 0 "), "{header}");
    assert!(header.to_lowercase().contains("unauthorized"));
}

#[tokio::test]
async fn gateway_waits_for_a_server_that_is_still_starting() {
    let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = reserved.local_addr().unwrap().port();
    drop(reserved);

    let starter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        start_naming_on(port, 100, Arc::new(MemoryStorage::new())).await
    });

    let gw = gateway(&format!("127.0.0.1:{port}"));
    let alice = register(&gw, "alice").await;
    starter.await.unwrap();
    run(&gw, &alice, "CREATE late.txt \"made it\"").await.unwrap();
    assert_eq!(run(&gw, &alice, "READ late.txt").await.unwrap().text(), "made it");
}

#[tokio::test]
async fn busy_server_is_retried_until_a_slot_frees() {
    let addr = start_naming_on(0, 1, Arc::new(MemoryStorage::new())).await;

    // Occupy the only slot; a response proves the session was admitted
    let occupant = TcpStream::connect(&addr).await.unwrap();
    let mut occupant = BufReader::new(occupant);
    occupant.get_mut().write_all(b"LIST\r\n").await.unwrap();
    let mut header = String::new();
    occupant.read_line(&mut header).await.unwrap();
    assert!(header.starts_with("530"), "{header}");

    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(occupant);
    });

    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;
    release.await.unwrap();
    assert_eq!(
        run(&gw, &alice, "LIST").await.unwrap().text(),
        "alice"
    );
}

#[tokio::test]
async fn remote_storage_server_backs_the_namespace() {
    let storage = StorageServer::bind("127.0.0.1:0", Arc::new(MemoryStorage::new()))
        .await
        .unwrap();
    let storage_addr = storage.local_addr().unwrap().to_string();
    tokio::spawn(storage.run());

    let remote = Arc::new(RemoteStorage::new(storage_addr, Duration::from_secs(2)));
    let addr = start_naming_on(0, 100, remote).await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;

    run(&gw, &alice, "CREATE r.txt \"remote\"").await.unwrap();
    run(&gw, &alice, "WRITE r.txt -1 \" bytes\"").await.unwrap();
    run(&gw, &alice, "COPY r.txt s.txt").await.unwrap();
    run(&gw, &alice, "DELETE r.txt").await.unwrap();

    assert_eq!(run(&gw, &alice, "READ s.txt").await.unwrap().text(), "remote bytes");
    let info = run(&gw, &alice, "INFO s.txt").await.unwrap().text();
    assert!(info.contains("Size: 12 bytes"), "{info}");
}

#[tokio::test]
async fn disk_storage_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let disk = Arc::new(DiskStorage::open(dir.path()).await.unwrap());
    let addr = start_naming_on(0, 100, disk).await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;

    run(&gw, &alice, "CREATE d.txt \"on disk\"").await.unwrap();
    run(&gw, &alice, "WRITE d.txt 10 \"!\"").await.unwrap();
    assert_eq!(
        run(&gw, &alice, "READ d.txt").await.unwrap().data.unwrap(),
        b"on disk\0\0\0!".to_vec()
    );
    run(&gw, &alice, "DELETE d.txt").await.unwrap();
    assert_kind(run(&gw, &alice, "READ d.txt").await, ErrorKind::NotFound, "not found");
}

#[tokio::test]
async fn readers_never_see_a_half_applied_write() {
    const SIZE: usize = 64 * 1024;
    let dir = tempfile::tempdir().unwrap();
    let disk = Arc::new(DiskStorage::open(dir.path()).await.unwrap());
    let addr = start_naming_on(0, 100, disk).await;
    let gw = Arc::new(gateway(&addr));
    let alice = register(&gw, "alice").await;
    let create = Command::Create {
        path: "big.txt".into(),
        content: "a".repeat(SIZE),
    };
    gw.execute(&alice, &create).await.unwrap();

    let writer = {
        let gw = Arc::clone(&gw);
        let alice = alice.clone();
        tokio::spawn(async move {
            for round in 0..6 {
                let fill = if round % 2 == 0 { "b" } else { "a" };
                let write = Command::Write {
                    path: "big.txt".into(),
                    offset: 0,
                    content: fill.repeat(SIZE),
                };
                gw.execute(&alice, &write).await.unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let gw = Arc::clone(&gw);
            let alice = alice.clone();
            tokio::spawn(async move {
                for _ in 0..6 {
                    let data = run(&gw, &alice, "READ big.txt").await.unwrap().data.unwrap();
                    assert_eq!(data.len(), SIZE);
                    let first = data[0];
                    assert!(data.iter().all(|b| *b == first), "read a mix of two writes");
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

/// Delays every write so a command is still running when its client leaves.
struct SlowWrites(MemoryStorage);

#[async_trait]
impl StorageEngine for SlowWrites {
    async fn create(&self, handle: ContentHandle, initial: &[u8]) -> Result<u64, NfsError> {
        self.0.create(handle, initial).await
    }

    async fn read(&self, handle: ContentHandle, range: ByteRange) -> Result<Vec<u8>, NfsError> {
        self.0.read(handle, range).await
    }

    async fn write(
        &self,
        handle: ContentHandle,
        offset: WriteOffset,
        bytes: &[u8],
    ) -> Result<u64, NfsError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.0.write(handle, offset, bytes).await
    }

    async fn duplicate(&self, src: ContentHandle) -> Result<ContentHandle, NfsError> {
        self.0.duplicate(src).await
    }

    async fn delete(&self, handle: ContentHandle) -> Result<(), NfsError> {
        self.0.delete(handle).await
    }

    async fn size(&self, handle: ContentHandle) -> Result<u64, NfsError> {
        self.0.size(handle).await
    }

    async fn list(&self) -> Result<Vec<ContentHandle>, NfsError> {
        self.0.list().await
    }
}

#[tokio::test]
async fn client_leaving_mid_command_leaves_no_locks_behind() {
    let config = NamingConfig {
        port: 0,
        ..NamingConfig::default()
    };
    let storage = Arc::new(SlowWrites(MemoryStorage::new()));
    let (addr, naming) = start_naming_with(config, storage).await;

    let stream = TcpStream::connect(&addr).await.unwrap();
    let mut stream = BufReader::new(stream);
    for line in ["REGISTER alice alice-secret\r\n", "CREATE log.txt \"x\"\r\n"] {
        stream.get_mut().write_all(line.as_bytes()).await.unwrap();
        let mut header = String::new();
        stream.read_line(&mut header).await.unwrap();
        assert!(header.starts_with("200 "), "{header}");
    }
    stream
        .get_mut()
        .write_all(b"WRITE log.txt -1 \"y\"\r\n")
        .await
        .unwrap();
    drop(stream);

    // READ queues behind the abandoned WRITE, which still completes
    let gw = gateway(&addr);
    let alice = Credentials::new("alice", "alice-secret");
    assert_eq!(run(&gw, &alice, "READ log.txt").await.unwrap().text(), "xy");
    assert_eq!(naming.locks().tracked_paths(), 0);
}

#[tokio::test]
async fn huge_write_offsets_are_invalid_and_harmless() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;
    run(&gw, &alice, "CREATE a.txt \"small\"").await.unwrap();

    let limit = NamingConfig::default().max_file_size;
    for line in [
        "WRITE a.txt 9223372036854775807 \"x\"".to_string(),
        format!("WRITE a.txt {limit} \"x\""),
    ] {
        assert_kind(run(&gw, &alice, &line).await, ErrorKind::InvalidArgument, "invalid");
    }
    assert_eq!(run(&gw, &alice, "READ a.txt").await.unwrap().text(), "small");
    let info = run(&gw, &alice, "INFO a.txt").await.unwrap().text();
    assert!(info.contains("Size: 5 bytes"), "{info}");
}

/// Storage channel that applies the first write and then resets the
/// connection instead of answering.
async fn start_resetting_storage(engine: Arc<dyn StorageEngine>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let reset_done = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let engine = Arc::clone(&engine);
            let reset_done = Arc::clone(&reset_done);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stream);
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                let request: StorageRequest = serde_json::from_str(line.trim_end()).unwrap();
                let is_write = matches!(request, StorageRequest::Write { .. });
                let response = execute(engine.as_ref(), request).await;

                let mut stream = reader.into_inner();
                if is_write && !reset_done.swap(true, Ordering::SeqCst) {
                    stream.set_linger(Some(Duration::ZERO)).unwrap();
                    drop(stream);
                    return;
                }
                let mut reply = serde_json::to_string(&response).unwrap();
                reply.push('\n');
                stream.write_all(reply.as_bytes()).await.unwrap();
            });
        }
    });
    addr
}

#[tokio::test]
async fn storage_reset_after_applying_a_write_is_not_retried() {
    let storage_addr = start_resetting_storage(Arc::new(MemoryStorage::new())).await;
    let remote = Arc::new(RemoteStorage::new(storage_addr, Duration::from_secs(2)));
    let addr = start_naming_on(0, 100, remote).await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;
    run(&gw, &alice, "CREATE log.txt \"start\"").await.unwrap();

    let err = run(&gw, &alice, "WRITE log.txt -1 \" once\"").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal, "{err}");
    assert_eq!(
        run(&gw, &alice, "READ log.txt").await.unwrap().text(),
        "start once"
    );
}

#[tokio::test]
async fn non_utf8_command_gets_an_answer() {
    let addr = start_naming().await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(b"READ \xff\xfe.txt\r\n").await.unwrap();

    let mut answer = String::new();
    stream.read_to_string(&mut answer).await.unwrap();
    assert!(answer.starts_with("501 0 "), "{answer}");
    assert!(answer.to_lowercase().contains("invalid"), "{answer}");
}

#[tokio::test]
async fn access_requests_undo_and_checkpoints_over_the_wire() {
    let addr = start_naming().await;
    let gw = gateway(&addr);
    let alice = register(&gw, "alice").await;
    let bob = register(&gw, "bob").await;
    run(&gw, &alice, "CREATE plan.txt \"v1\"").await.unwrap();

    let reply = run(&gw, &bob, "REQUESTACCESS plan.txt").await.unwrap();
    assert_eq!(reply.message, "Access request sent to alice");
    assert_eq!(
        run(&gw, &alice, "VIEWREQUESTS").await.unwrap().text(),
        "bob requested READ access to plan.txt"
    );
    run(&gw, &alice, "APPROVEREQUEST plan.txt bob").await.unwrap();
    assert_eq!(run(&gw, &bob, "READ plan.txt").await.unwrap().text(), "v1");

    run(&gw, &alice, "CHECKPOINT plan.txt first").await.unwrap();
    run(&gw, &alice, "WRITE plan.txt 0 \"v2\"").await.unwrap();
    assert_kind(
        run(&gw, &bob, "UNDO plan.txt").await,
        ErrorKind::PermissionDenied,
        "permission",
    );
    run(&gw, &alice, "UNDO plan.txt").await.unwrap();
    assert_eq!(run(&gw, &bob, "READ plan.txt").await.unwrap().text(), "v1");

    run(&gw, &alice, "WRITE plan.txt -1 \" and v3\"").await.unwrap();
    run(&gw, &alice, "REVERT plan.txt first").await.unwrap();
    assert_eq!(run(&gw, &alice, "READ plan.txt").await.unwrap().text(), "v1");
    assert_eq!(
        run(&gw, &bob, "VIEWCHECKPOINT plan.txt first").await.unwrap().text(),
        "v1"
    );
}
