//! Client against a live server on an ephemeral port.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use qmock_client::{ClientConfig, ClientError, Credentials, KernelCode, QmockClient};
use qmock_hal::JobStatus;
use qmock_server::config::ExecutorConfig;
use qmock_server::{AppState, JobService, ProgramExecutor, router};

const GHZ: &str = r#"
define void @ghz() #0 {
  call void @__quantum__qis__h__body(ptr null)
  call void @__quantum__qis__cnot__body(ptr null, ptr inttoptr (i64 1 to ptr))
  call void @__quantum__qis__cnot__body(ptr inttoptr (i64 1 to ptr), ptr inttoptr (i64 2 to ptr))
  call void @__quantum__qis__mz__body(ptr null, ptr null)
  call void @__quantum__qis__mz__body(ptr inttoptr (i64 1 to ptr), ptr inttoptr (i64 1 to ptr))
  call void @__quantum__qis__mz__body(ptr inttoptr (i64 2 to ptr), ptr inttoptr (i64 2 to ptr))
  ret void
}
attributes #0 = { "entry_point" "requiredQubits"="3" }
"#;

const ONE: &str = r#"
define void @one() #0 {
  call void @__quantum__qis__x__body(ptr null)
  call void @__quantum__qis__mz__body(ptr null, ptr null)
  ret void
}
attributes #0 = { "entry_point" "requiredQubits"="1" }
"#;

async fn spawn_server() -> String {
    let executor = ProgramExecutor::simulator(&ExecutorConfig {
        max_qubits: 8,
        seed: Some(3),
    });
    let app = router(AppState::new(JobService::new(executor, 3)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/jobs")
}

fn client(base_url: &str) -> QmockClient {
    let config = ClientConfig::default()
        .with_base_url(base_url)
        .with_poll_interval(Duration::from_millis(5));
    QmockClient::with_credentials(config, Credentials::from_key("test-key")).unwrap()
}

#[tokio::test]
async fn test_run_returns_counts_in_kernel_order() {
    let client = client(&spawn_server().await);
    let kernels = [
        KernelCode::new("ghz", STANDARD.encode(GHZ)),
        KernelCode::new("one", STANDARD.encode(ONE)),
    ];

    let counts = client.run(&kernels, 64).await.unwrap();
    assert_eq!(counts.len(), 2);

    assert_eq!(counts[0].total(), 64);
    assert_eq!(counts[0].get("000") + counts[0].get("111"), 64);
    assert_eq!(counts[1].get("1"), 64);
}

#[tokio::test]
async fn test_poll_reports_running_before_completion() {
    let client = client(&spawn_server().await);
    let request = client
        .create_job(&[KernelCode::new("one", STANDARD.encode(ONE))], 4)
        .unwrap();
    let job_id = client.submit(&request).await.unwrap();

    for _ in 0..3 {
        assert_eq!(client.poll(&job_id).await.unwrap(), JobStatus::Running);
    }
    assert_eq!(
        client.poll(&job_id).await.unwrap(),
        JobStatus::Completed {
            result: vec![r#"{"1":4}"#.to_string()]
        }
    );
}

#[tokio::test]
async fn test_rejected_program_surfaces_api_error() {
    let client = client(&spawn_server().await);
    let request = client
        .create_job(&[KernelCode::new("junk", "!!!")], 4)
        .unwrap();

    let result = client.submit(&request).await;
    assert!(matches!(
        result,
        Err(ClientError::ApiError { status: 400, .. })
    ));
}
