use futures_util::{Stream, StreamExt};
use marketlens_core::Step;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Forward-only stream of the steps of one run.
///
/// The run itself executes in its own task; dropping the stream only stops delivery,
/// the run still finishes and persists its report. The stream ends after the terminal
/// step.
pub struct StepStream {
    inner: ReceiverStream<Step>,
}

impl StepStream {
    pub(crate) fn new(rx: mpsc::Receiver<Step>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Drains the stream until the run ends.
    pub async fn collect_steps(self) -> Vec<Step> {
        self.collect().await
    }
}

impl Stream for StepStream {
    type Item = Step;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Step>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
