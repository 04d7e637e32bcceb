#![cfg(all(unix, feature = "tokio"))]

//! Unix-domain-socket transport exercised against a live in-test broker.

// std
use std::{
	env, fs,
	path::{Path, PathBuf},
	process,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{UnixListener, UnixStream},
	task::JoinHandle,
};
// self
use broker_dispatch::{
	bundle::{OperationBundle, ResponseBundle},
	error::CommunicationCategory,
	ipc::{BrokerEndpoint, IpcTransport, LoopbackTransport, TransportKind, UnixSocketTransport, uds},
	ops::{BrokerClient, GetAccountsOperation, HelloOperation},
	serde_json::{self, json},
	telemetry::NoopTelemetry,
};

static SOCKET_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_socket_path() -> PathBuf {
	let n = SOCKET_COUNTER.fetch_add(1, Ordering::SeqCst);

	env::temp_dir().join(format!("broker-dispatch-it-{}-{n}.sock", process::id()))
}

fn endpoint_for(path: &Path) -> BrokerEndpoint {
	BrokerEndpoint::parse(&format!("unix://{}", path.display()))
		.expect("The socket path should form a valid endpoint.")
}

async fn read_frame(stream: &mut UnixStream) -> Option<OperationBundle> {
	let mut len_buf = [0_u8; 4];

	stream.read_exact(&mut len_buf).await.ok()?;

	let len = u32::from_be_bytes(len_buf) as usize;
	let mut body = vec![0_u8; len];

	stream.read_exact(&mut body).await.ok()?;

	serde_json::from_slice(&body).ok()
}

async fn write_frame(stream: &mut UnixStream, response: Option<ResponseBundle>) {
	let body = match &response {
		Some(response) => serde_json::to_vec(response).expect("The response frame should encode."),
		None => Vec::new(),
	};

	stream
		.write_all(&(body.len() as u32).to_be_bytes())
		.await
		.expect("The frame length should be written.");

	if !body.is_empty() {
		stream.write_all(&body).await.expect("The frame body should be written.");
	}
}

/// Binds the socket before returning, so tests never race the listener setup.
fn spawn_broker<F>(path: &Path, respond: F) -> JoinHandle<()>
where
	F: Fn(&OperationBundle) -> Option<ResponseBundle> + Send + Sync + 'static,
{
	let _ = fs::remove_file(path);

	let listener = UnixListener::bind(path).expect("The broker socket should bind.");

	tokio::spawn(async move {
		while let Ok((mut stream, _)) = listener.accept().await {
			// One frame per request; EOF means the client is done with this
			// connection.
			while let Some(request) = read_frame(&mut stream).await {
				let response = respond(&request);

				write_frame(&mut stream, response).await;
			}
		}
	})
}

/// Like [`spawn_broker`], but answers every request with the same raw bytes, bypassing
/// frame encoding entirely.
fn spawn_raw_broker(path: &Path, reply: Vec<u8>) -> JoinHandle<()> {
	let _ = fs::remove_file(path);

	let listener = UnixListener::bind(path).expect("The broker socket should bind.");

	tokio::spawn(async move {
		while let Ok((mut stream, _)) = listener.accept().await {
			while read_frame(&mut stream).await.is_some() {
				stream.write_all(&reply).await.expect("The raw reply should be written.");
			}
		}
	})
}

fn framed(body: &[u8]) -> Vec<u8> {
	let mut frame = (body.len() as u32).to_be_bytes().to_vec();

	frame.extend_from_slice(body);

	frame
}

fn script(request: &OperationBundle) -> Option<ResponseBundle> {
	match request.operation.as_str() {
		HelloOperation::OPERATION => {
			let negotiated =
				request.payload.text(HelloOperation::PREFERRED_KEY).unwrap_or("1.0").to_owned();

			Some(ResponseBundle::new().with(HelloOperation::NEGOTIATED_KEY, negotiated))
		},
		GetAccountsOperation::OPERATION => Some(ResponseBundle::new().with(
			GetAccountsOperation::ACCOUNTS_KEY,
			json!([{ "id": "acct-1", "username": "ada@contoso.example" }]),
		)),
		other => panic!("Unexpected operation `{other}`."),
	}
}

#[tokio::test]
async fn socket_round_trip_lists_accounts() {
	let path = temp_socket_path();
	let _broker = spawn_broker(&path, script);
	let transport =
		UnixSocketTransport::new(endpoint_for(&path)).with_connect_timeout(Duration::from_secs(5));
	let client = BrokerClient::new(vec![Arc::new(transport)], Arc::new(NoopTelemetry));

	let accounts = client.get_accounts().await.expect("The socket listing should succeed.");

	assert_eq!(accounts.len(), 1);
	assert_eq!(accounts[0].id, "acct-1");
	// The prerequisite handshake rode the same socket and was memoized.
	assert!(client.hello_cache().negotiated(TransportKind::UnixSocket).is_some());
}

#[tokio::test]
async fn connection_refused_maps_to_a_communication_error() {
	let transport = UnixSocketTransport::new(endpoint_for(&temp_socket_path()));
	let request = OperationBundle::new("probe.echo");

	let error = transport
		.communicate(&request)
		.await
		.expect_err("A dead socket path should fail to connect.");

	assert_eq!(error.category, CommunicationCategory::ConnectionFailure);
	assert_eq!(error.transport, TransportKind::UnixSocket);
	assert!(error.source.is_some());
}

#[tokio::test]
async fn socket_failure_falls_back_to_the_next_transport() {
	let dead = UnixSocketTransport::new(endpoint_for(&temp_socket_path()));
	let loopback = LoopbackTransport::new(|request| Ok(script(request)));
	let client = BrokerClient::new(
		vec![Arc::new(dead) as Arc<dyn IpcTransport>, Arc::new(loopback)],
		Arc::new(NoopTelemetry),
	);

	let accounts = client.get_accounts().await.expect("The fallback listing should succeed.");

	assert_eq!(accounts.len(), 1);
	assert_eq!(
		client.hello_cache().negotiated(TransportKind::InProcess),
		Some("2.0".parse().expect("The default preferred version should parse."))
	);
}

#[tokio::test]
async fn zero_length_frames_mean_an_absent_response() {
	let path = temp_socket_path();
	let _broker = spawn_broker(&path, |_| None);
	let transport = UnixSocketTransport::new(endpoint_for(&path));
	let request = OperationBundle::new("probe.silent");

	let response = transport
		.communicate(&request)
		.await
		.expect("A zero-length frame should be a healthy reply.");

	assert!(response.is_none());
}

#[tokio::test]
async fn undecodable_response_frames_map_to_connection_failures() {
	let path = temp_socket_path();
	let _broker = spawn_raw_broker(&path, framed(b"this is not a json frame"));
	let transport = UnixSocketTransport::new(endpoint_for(&path));
	let request = OperationBundle::new("probe.noise");

	let error = transport
		.communicate(&request)
		.await
		.expect_err("A garbage response frame should be rejected.");

	assert_eq!(error.category, CommunicationCategory::ConnectionFailure);
	assert_eq!(error.transport, TransportKind::UnixSocket);
	assert!(error.source.is_some());
}

#[tokio::test]
async fn oversized_response_frames_map_to_connection_failures() {
	let path = temp_socket_path();
	// A bare length prefix past the cap; the advertised body never has to exist.
	let announced = (uds::MAX_FRAME_LEN as u32 + 1).to_be_bytes().to_vec();
	let _broker = spawn_raw_broker(&path, announced);
	let transport = UnixSocketTransport::new(endpoint_for(&path));
	let request = OperationBundle::new("probe.flood");

	let error = transport
		.communicate(&request)
		.await
		.expect_err("An oversized response frame should be rejected.");

	assert_eq!(error.category, CommunicationCategory::ConnectionFailure);
	assert_eq!(error.transport, TransportKind::UnixSocket);
	// The cap trips on the prefix alone, so there is no underlying error to carry.
	assert!(error.source.is_none());
}

#[tokio::test]
async fn oversized_requests_are_rejected_before_connecting() {
	// Dead endpoint on purpose: the size check fires before any connection attempt.
	let transport = UnixSocketTransport::new(endpoint_for(&temp_socket_path()));
	let request =
		OperationBundle::new("probe.huge").with("blob", "x".repeat(uds::MAX_FRAME_LEN + 1));

	let error = transport
		.communicate(&request)
		.await
		.expect_err("An oversized frame should be rejected.");

	assert_eq!(error.category, CommunicationCategory::UnsupportedByClient);
}
