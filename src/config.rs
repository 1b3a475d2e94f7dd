use std::sync::Arc;

use crate::backend::BackendKind;
use crate::diag::DiagnosticSink;
use crate::mode::Mode;

/// Construction-time endpoint settings. `port: None` leaves the socket
/// unbound (outbound connect / send-only use); `Some(0)` binds to an
/// OS-assigned port which the endpoint then reports.
#[derive(Clone)]
pub struct EndpointOptions {
    pub mode: Mode,
    pub backend: BackendKind,
    pub port: Option<u16>,
    /// Diagnostic override for this endpoint; falls back to the process
    /// sink installed by [`crate::init`].
    pub diag: Option<Arc<dyn DiagnosticSink>>,
}

impl EndpointOptions {
    pub fn unbound() -> EndpointOptions {
        EndpointOptions::default()
    }

    pub fn bound(port: u16) -> EndpointOptions {
        EndpointOptions {
            port: Some(port),
            ..EndpointOptions::default()
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> EndpointOptions {
        self.mode = mode;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> EndpointOptions {
        self.backend = backend;
        self
    }

    pub fn with_diag(mut self, diag: Arc<dyn DiagnosticSink>) -> EndpointOptions {
        self.diag = Some(diag);
        self
    }
}

impl Default for EndpointOptions {
    fn default() -> EndpointOptions {
        EndpointOptions {
            mode: Mode::default(),
            backend: BackendKind::Socket2,
            port: None,
            diag: None,
        }
    }
}
