//! User lookup demo binary
//!
//! Drives the request controller through its whole lifecycle against the
//! in-memory directory: auto-fetch, refetch with merged params, a failing
//! lookup, a retry, and a local mutate.

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reqflow_core::options::RequestOptions;
use reqflow_runtime::RequestController;
use user_lookup::{User, UserDirectory, lookup_params};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "user_lookup=debug,reqflow_core=debug,reqflow_runtime=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== User Lookup: reqflow request-lifecycle controller ===\n");

    let options: RequestOptions<_, _, User> = RequestOptions::new()
        .with_request_key("user-lookup")
        .with_default_params(lookup_params(1))
        .with_on_success(|user: &User, _params| {
            println!("   on_success: {} <{}>", user.name, user.email);
        })
        .with_on_fail(|msg: &str| {
            println!("   on_fail: {msg}");
        })
        .with_on_refetch(|| {
            println!("   on_refetch: merging over cached params");
        });

    // Auto-start fetches the default params immediately.
    println!(">>> start (auto-fetch id=1)");
    let started = RequestController::start(UserDirectory::with_sample_data().into_runner(), options)
        .await;
    let Ok((controller, mut handle)) = started else {
        eprintln!("controller failed to start");
        return;
    };
    handle.wait().await;
    println!("   data: {:?}\n", controller.data().await);

    // Refetch with a partial parameter overlay.
    println!(">>> refetch {{id: 2}}");
    if let Ok(mut handle) = controller.refetch(None, Some(lookup_params(2))).await {
        handle.wait().await;
    }
    println!("   data: {:?}\n", controller.data().await);

    // A lookup the directory rejects at the application level.
    println!(">>> run {{id: 404}}");
    if let Ok(mut handle) = controller.run(Some(lookup_params(404)), None).await {
        handle.wait().await;
    }
    println!(
        "   phase: {}, message: {:?}\n",
        controller.phase().await,
        controller.message().await
    );

    // Retry reuses the cached params (still id=404).
    println!(">>> retry");
    if let Ok(mut handle) = controller.retry(None).await {
        handle.wait().await;
    }
    println!(
        "   phase: {}, message: {:?}\n",
        controller.phase().await,
        controller.message().await
    );

    // Recover, then mutate locally without touching the network.
    println!(">>> run {{id: 3}}");
    if let Ok(mut handle) = controller.run(Some(lookup_params(3)), None).await {
        handle.wait().await;
    }
    println!("   data: {:?}\n", controller.data().await);

    println!(">>> mutate (local optimistic update)");
    let renamed = User {
        id: 3,
        name: "Annie J. Easley".to_string(),
        email: "annie@example.com".to_string(),
    };
    if let Ok(mut handle) = controller.mutate(renamed).await {
        handle.wait().await;
    }
    println!("   data: {:?}\n", controller.data().await);

    let _ = controller.shutdown(Duration::from_secs(5)).await;
    println!("=== done ===");
}
