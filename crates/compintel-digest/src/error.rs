//! Error type for `compintel-digest`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("template error: {0}")]
  Template(#[from] Box<handlebars::TemplateError>),

  #[error("render error: {0}")]
  Render(#[from] handlebars::RenderError),

  #[error("invalid mail address: {0}")]
  Address(#[from] lettre::address::AddressError),

  #[error("cannot build message: {0}")]
  Message(#[from] lettre::error::Error),

  #[error("smtp error: {0}")]
  Smtp(#[from] lettre::transport::smtp::Error),

  #[error(transparent)]
  Core(#[from] compintel_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<handlebars::TemplateError> for Error {
  fn from(e: handlebars::TemplateError) -> Self { Self::Template(Box::new(e)) }
}

/// Anything that goes wrong between compiling a digest and handing it to the
/// transport is a delivery failure.
impl From<Error> for compintel_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(inner) => inner,
      other => Self::Delivery(other.to_string()),
    }
  }
}
