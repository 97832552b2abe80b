//graceful shutdown helper shared by the server entrypoint
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Returns a token that is cancelled when the process receives ctrl-c.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let tc = token.clone();
    //spawn once to listen for ctrl-c
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl+C handler");
        tc.cancel();
    });
    token
}
