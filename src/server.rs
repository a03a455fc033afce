//! The sketchpad page and its two actions over HTTP.
//!
//! The classifier lives on a single worker thread. Handlers hand it one job
//! per submit and await the answer, so events reach the model one at a time.

use std::sync::mpsc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::{
    canvas::{Canvas, CHANNELS, MAX_SIDE},
    error::InferenceError,
    inference::DigitClassifier,
    widget::{LabelView, Sketchpad, SubmitError},
};

static PAGE: &str = include_str!("server/page.html");

/// One canvas at the largest accepted size.
const MAX_BODY: usize = MAX_SIDE as usize * MAX_SIDE as usize * CHANNELS;

type Callback = oneshot::Sender<Result<Option<LabelView>, SubmitError>>;

struct Job {
    canvas: Option<Canvas>,
    callback: Callback,
}

/// Handle to the thread that owns the classifier.
#[derive(Clone)]
pub struct InferenceWorker {
    sender: mpsc::Sender<Job>,
}

impl InferenceWorker {
    pub fn spawn<C>(classifier: C) -> Self
    where
        C: DigitClassifier + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<Job>();

        std::thread::spawn(move || {
            for job in receiver.iter() {
                let mut pad = Sketchpad::with_drawing(job.canvas);
                let result = pad.submit(&classifier).map(|()| pad.label().cloned());

                // The request may have been dropped while we were busy.
                job.callback.send(result).ok();
            }
            log::info!("Inference worker stopped");
        });

        Self { sender }
    }

    /// Classifies one canvas on the worker thread.
    pub async fn submit(&self, canvas: Option<Canvas>) -> Result<Option<LabelView>, SubmitError> {
        let (callback, response) = oneshot::channel();

        self.sender
            .send(Job { canvas, callback })
            .map_err(|_| SubmitError::from(InferenceError::WorkerUnavailable))?;

        response
            .await
            .map_err(|_| SubmitError::from(InferenceError::WorkerUnavailable))?
    }
}

/// Size of the canvas carried in the request body.
#[derive(Debug, Default, Deserialize)]
pub struct CanvasSize {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// What the page should show after an action.
#[derive(Debug, PartialEq, Serialize)]
pub struct PadView {
    pub clear_drawing: bool,
    pub label: Option<LabelView>,
}

impl PadView {
    fn from_pad(pad: &Sketchpad) -> Self {
        Self {
            clear_drawing: pad.drawing().is_none(),
            label: pad.label().cloned(),
        }
    }
}

pub fn router(worker: InferenceWorker) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/submit", post(submit))
        .route("/clear", post(clear))
        .layer(DefaultBodyLimit::max(MAX_BODY))
        .with_state(worker)
}

/// Serves the sketchpad until the process exits.
pub async fn serve(address: &str, worker: InferenceWorker) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    log::info!("Sketchpad listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(worker)).await
}

async fn index() -> Html<&'static str> {
    Html(PAGE)
}

/// Body: raw RGBA bytes, row major. An empty body means nothing was drawn.
async fn submit(
    State(worker): State<InferenceWorker>,
    Query(size): Query<CanvasSize>,
    body: Bytes,
) -> Result<Json<PadView>, (StatusCode, Json<SubmitError>)> {
    let canvas = (!body.is_empty()).then(|| Canvas::new(size.width, size.height, body.to_vec()));

    match worker.submit(canvas).await {
        Ok(label) => {
            match &label {
                Some(view) => log::info!("Submit classified, top label {:?}", view.top.first()),
                None => log::info!("Submit without drawing, display cleared"),
            }
            Ok(Json(PadView {
                clear_drawing: false,
                label,
            }))
        }
        Err(err) => {
            log::warn!("Submit failed: {err}");
            Err((StatusCode::UNPROCESSABLE_ENTITY, Json(err)))
        }
    }
}

async fn clear() -> Json<PadView> {
    let mut pad = Sketchpad::default();
    pad.clear();

    Json(PadView::from_pad(&pad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::tests::FixedClassifier;

    fn white(width: u32, height: u32) -> Bytes {
        Bytes::from(Canvas::filled(width, height, [255, 255, 255, 255]).rgba)
    }

    #[tokio::test]
    async fn page_has_both_actions() {
        let Html(page) = index().await;

        assert!(page.contains("Submit"));
        assert!(page.contains("Clear"));
        assert!(page.contains("<canvas"));
    }

    #[tokio::test]
    async fn submit_returns_ranked_labels() {
        let worker = InferenceWorker::spawn(FixedClassifier::default());
        let size = CanvasSize {
            width: 280,
            height: 280,
        };

        let Json(view) = submit(State(worker), Query(size), white(280, 280))
            .await
            .unwrap();

        let label = view.label.unwrap();
        assert!(!view.clear_drawing);
        assert_eq!(label.top.len(), 3);
        assert_eq!(label.top[0].label, "7");
    }

    #[tokio::test]
    async fn empty_body_clears_display() {
        let worker = InferenceWorker::spawn(FixedClassifier::default());

        let Json(view) = submit(State(worker), Query(CanvasSize::default()), Bytes::new())
            .await
            .unwrap();

        assert_eq!(view.label, None);
    }

    #[tokio::test]
    async fn malformed_canvas_is_unprocessable_and_worker_survives() {
        let worker = InferenceWorker::spawn(FixedClassifier::default());
        let size = CanvasSize {
            width: 100,
            height: 100,
        };

        let (status, Json(err)) = submit(State(worker.clone()), Query(size), white(10, 10))
            .await
            .unwrap_err();

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message.starts_with("Processing error: invalid canvas"));

        let label = worker
            .submit(Some(Canvas::filled(28, 28, [0, 0, 0, 255])))
            .await
            .unwrap();
        assert!(label.is_some());
    }

    #[tokio::test]
    async fn clear_resets_everything() {
        let Json(view) = clear().await;

        assert_eq!(
            view,
            PadView {
                clear_drawing: true,
                label: None,
            }
        );
    }
}
