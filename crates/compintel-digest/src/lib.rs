//! Digest service for the competitor intelligence tracker.
//!
//! Holds the current [`DigestSchedule`](compintel_core::schedule::DigestSchedule),
//! serves the KPI read models, compiles and renders digests and hands them to
//! a [`Mailer`]. [`spawn_scheduler`] sends digests in the background whenever
//! the schedule says one is due.

pub mod error;
pub mod mailer;
pub mod render;
pub mod service;

pub use error::{Error, Result};
pub use mailer::{LogMailer, Mailer, MailerBackend, SmtpMailer, SmtpSettings, TlsMode};
pub use render::{DigestRenderer, RenderedDigest};
pub use service::{DeliveryReport, DigestService, spawn_scheduler};
