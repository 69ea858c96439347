//! The narrow interface between the render driver and the concrete drawing backend.
//!
//! Per the system's design, the core never hardcodes "Cairo" as a concept beyond this
//! module: [`DrawingCtx`](crate::drawing_ctx::DrawingCtx) emits transform/clip/stroke/fill/
//! group/paint/image/compositing calls, and [`BackendError`] is the single error type that
//! a failure from that collaborator surfaces as. The crate ships exactly one implementation
//! of this seam, backed by `cairo-rs` (the same library the rest of the render driver already
//! calls directly, following the GNOME stack), since this has always assumed a single, real
//! Cairo backend rather than a pluggable one.
//!
//! `BackendError` exists so that `RenderingError::Rendering` can carry a cause without the
//! rest of the crate needing to know that the cause happened to come from Cairo.

use std::fmt;

/// An error reported by the drawing backend.
///
/// This corresponds to the `BackendFailure` error kind: an unrecoverable problem reported by
/// the 2D drawing collaborator (running out of surface memory, an invalid intermediate
/// surface, etc). Unlike `InvalidAttribute` or `UnresolvedReference`, this is never absorbed
/// locally — it propagates up to the caller of `handle_render`.
#[derive(Debug, Clone)]
pub enum BackendError {
    /// The backend ran out of memory while allocating a surface or pattern.
    OutOfMemory,
    /// The backend was asked to create a surface or pattern with an invalid size.
    InvalidSize,
    /// Any other backend failure, carrying the backend's own status message.
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::OutOfMemory => write!(f, "drawing backend ran out of memory"),
            BackendError::InvalidSize => write!(f, "drawing backend was given an invalid size"),
            BackendError::Other(ref s) => write!(f, "drawing backend error: {}", s),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<cairo::Error> for BackendError {
    fn from(e: cairo::Error) -> BackendError {
        match e {
            cairo::Error::NoMemory => BackendError::OutOfMemory,
            cairo::Error::InvalidSize => BackendError::InvalidSize,
            other => BackendError::Other(format!("{:?}", other)),
        }
    }
}
