use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Wraps an async byte sink and reports every chunk that passes through it.
///
/// The callback receives the size of the chunk just written and the running
/// total. It is invoked only for bytes the inner sink actually accepted, so a
/// short write reports the short count.
pub struct ProgressWriter<W, F> {
    inner: W,
    written: u64,
    on_chunk: F,
}

impl<W, F> ProgressWriter<W, F>
where
    F: FnMut(usize, u64),
{
    pub fn new(inner: W, on_chunk: F) -> Self {
        Self {
            inner,
            written: 0,
            on_chunk,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    fn record(&mut self, n: usize) {
        if n > 0 {
            self.written += n as u64;
            (self.on_chunk)(n, self.written);
        }
    }
}

impl<W, F> AsyncWrite for ProgressWriter<W, F>
where
    W: AsyncWrite + Unpin,
    F: FnMut(usize, u64) + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.record(n);
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Progress callback that emits a debug event for every chunk of `label`.
pub fn log_progress(label: String) -> impl FnMut(usize, u64) + Unpin {
    move |chunk, total| tracing::debug!(file = %label, chunk, total, "File upload in progress")
}
