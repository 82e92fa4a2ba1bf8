//! Clients for the external model providers: embeddings for indexing and
//! queries, chat completions for the generative fallback.

pub mod completion;
pub mod embeddings;
pub mod retry;

/// A TCP listener that accepts connections and never answers. Returns its
/// base URL and a count of accepted connections.
#[cfg(test)]
pub(crate) async fn silent_server() -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            // Hold the socket so the client waits for a response.
            open.push(socket);
        }
    });

    (format!("http://{addr}"), accepted)
}
