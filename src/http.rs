use crate::{
    discovery::Discovery,
    error::BootstrapError,
    services::ServiceLister,
};
use axum::{
    extract::{
        ConnectInfo,
        Request,
        State,
    },
    http::StatusCode,
    response::{
        IntoResponse as _,
        Response,
    },
    routing::any,
    Json,
    Router,
};
use std::{
    future::Future,
    net::SocketAddr,
    sync::Arc,
};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::signal::unix::{
    signal,
    SignalKind,
};

pub const SFTP_ROUTE: &str = "/sftp";

/// Routes `/sftp` for any method to a fresh discovery query.
pub fn router<L>(discovery: Arc<Discovery<L>>) -> Router
where
    L: ServiceLister + 'static,
{
    Router::new()
        .route(SFTP_ROUTE, any(handle_sftp::<L>))
        .with_state(discovery)
}

async fn handle_sftp<L>(State(discovery): State<Arc<Discovery<L>>>, request: Request) -> Response
where
    L: ServiceLister + 'static,
{
    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(remote)) => info!("Serving {SFTP_ROUTE} request from {remote}"),
        None => info!("Serving {SFTP_ROUTE} request"),
    }

    match discovery.discover().await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => {
            error!("Error getting sftp services: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn bind(address: &str) -> Result<TcpListener, BootstrapError> {
    TcpListener::bind(address).await.map_err(|source| BootstrapError::Bind {
        address: address.to_string(),
        source,
    })
}

/// Serves until the listener fails or the process receives SIGINT or SIGTERM.
pub async fn serve(listener: TcpListener, router: Router) -> Result<(), BootstrapError> {
    serve_until(listener, router, shutdown_signal()).await
}

async fn serve_until<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(BootstrapError::Serve)?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Unable to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        discovery::DiscoveryEntry,
        services::fake::{
            service,
            FakeServices,
        },
    };
    use axum::body::Body;
    use std::time::Duration;
    use tokio::{
        io::{
            AsyncReadExt as _,
            AsyncWriteExt as _,
        },
        net::TcpStream,
        sync::oneshot,
    };
    use tower::ServiceExt as _;

    fn discovery(services: FakeServices) -> Arc<Discovery<FakeServices>> {
        Arc::new(Discovery::new(
            services,
            vec!["app=microsite".to_string(), "app=lamp".to_string()],
            "-sftp",
        ))
    }

    fn request(method: &str, uri: &str) -> Request {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn sftp_returns_entries_as_json() {
        let discovery = discovery(
            FakeServices::default()
                .with(
                    "app=microsite",
                    vec![
                        service("ns-a", "web-sftp", &["1.2.3.4"], &[22]),
                        service("ns-b", "other", &["5.6.7.8"], &[22]),
                    ],
                )
                .with("app=lamp", vec![service("ns-c", "shop-sftp", &[], &[22])]),
        );

        let response = router(discovery).oneshot(request("GET", "/sftp")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body = body_bytes(response).await;
        assert_eq!(
            String::from_utf8(body.clone()).unwrap(),
            r#"[{"namespace":"ns-a","addresses":["1.2.3.4:22"]},{"namespace":"ns-c","addresses":[]}]"#
        );
        let entries: Vec<DiscoveryEntry> = serde_json::from_slice(&body).unwrap();
        assert_eq!(entries[0].namespace, "ns-a");
        assert_eq!(entries[1].addresses, Vec::<String>::new());
    }

    #[tokio::test]
    async fn no_matches_is_an_empty_array() {
        let response = router(discovery(FakeServices::default()))
            .oneshot(request("GET", "/sftp"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"[]");
    }

    #[tokio::test]
    async fn any_method_reaches_handler() {
        let discovery = discovery(FakeServices::default().with(
            "app=lamp",
            vec![service("ns-a", "web-sftp", &["1.2.3.4"], &[22])],
        ));

        for method in ["POST", "PUT", "DELETE"] {
            let response = router(discovery.clone()).oneshot(request(method, "/sftp")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{method}");
        }
    }

    #[tokio::test]
    async fn upstream_failure_is_500_with_empty_body_and_recovers() {
        let discovery = discovery(FakeServices::default().with(
            "app=microsite",
            vec![service("ns-a", "web-sftp", &["1.2.3.4"], &[22])],
        ));
        discovery.lister().fail("app=lamp");
        let app = router(discovery.clone());

        let response = app.clone().oneshot(request("GET", "/sftp")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_bytes(response).await.is_empty());

        discovery.lister().recover("app=lamp");

        let response = app.oneshot(request("GET", "/sftp")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let entries: Vec<DiscoveryEntry> = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn every_request_queries_upstream() {
        let discovery = discovery(FakeServices::default());
        let app = router(discovery.clone());

        for _ in 0..2 {
            app.clone().oneshot(request("GET", "/sftp")).await.unwrap();
        }

        assert_eq!(discovery.lister().queried().len(), 4);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = router(discovery(FakeServices::default()))
            .oneshot(request("GET", "/other"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_over_tcp_until_shutdown() {
        let discovery = discovery(FakeServices::default().with(
            "app=microsite",
            vec![service("ns-a", "web-sftp", &["1.2.3.4"], &[22])],
        ));
        let listener = bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_until(listener, router(discovery), async move {
            let _ = stop_rx.await;
        }));

        let mut stream = TcpStream::connect(address).await.unwrap();
        stream
            .write_all(b"GET /sftp HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with(r#"[{"namespace":"ns-a","addresses":["1.2.3.4:22"]}]"#), "{response}");

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_triggers_shutdown() {
        // keeps the default SIGTERM action from ending the test binary
        let _sigterm = signal(SignalKind::terminate()).unwrap();
        let shutdown = tokio::spawn(shutdown_signal());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = std::process::Command::new("sh")
            .args(["-c", &format!("kill -TERM {}", std::process::id())])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), shutdown)
            .await
            .unwrap()
            .unwrap();
    }
}
