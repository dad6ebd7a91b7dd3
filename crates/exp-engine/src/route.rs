//! A declarative subject→topic mapping, its worker count, and its
//! transformation kind.

use exp_config::RouteConf;
use thiserror::Error;

use crate::subject::{SubjectError, validate_subject};
use crate::transform::TransformKind;

/// Number of workers assumed when a route's config leaves `workers` at
/// its zero default.
pub const DEFAULT_WORKERS: usize = 10;

/// Upper bound applied to an explicitly configured worker count.
pub const MAX_WORKERS: usize = 200;

/// Route construction only fails on the subject — an unrecognized `type`
/// is carried through as [`TransformKind::Unknown`] and rejected later, per
/// message, in [`crate::transform::transform`].
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Subject(#[from] SubjectError),
}

/// A route, immutable once built. `subject` is the fully-qualified bus
/// subject (including the `"export."` instance prefix and a trailing
/// `>` wildcard) that this route subscribes to.
#[derive(Debug, Clone)]
pub struct Route {
    pub nats_topic: String,
    pub mqtt_topic: String,
    pub subtopic: String,
    pub kind: TransformKind,
    pub workers: usize,
    pub subject: String,
}

impl Route {
    /// Build and validate a route from its config entry. Only an invalid
    /// subject is reported as [`RouteError`] so the caller can log and skip
    /// rather than abort the whole route table; an unrecognized `type` is
    /// accepted here and rejected later, per delivered message.
    pub fn from_conf(conf: &RouteConf) -> Result<Self, RouteError> {
        let kind = TransformKind::parse(&conf.kind);
        let subject = format!("export.{}.>", conf.nats_topic);
        validate_subject(&subject)?;

        let workers = match conf.workers {
            0 => DEFAULT_WORKERS,
            w => w.min(MAX_WORKERS),
        };

        Ok(Self {
            nats_topic: conf.nats_topic.clone(),
            mqtt_topic: conf.mqtt_topic.clone(),
            subtopic: conf.subtopic.clone(),
            kind,
            workers,
            subject,
        })
    }

    /// `<mqtt_topic>[/<subtopic>]/<delivered subject with '.' -> '/'>`.
    pub fn outbound_topic(&self, delivered_subject: &str) -> String {
        let mut topic = self.mqtt_topic.clone();
        if !self.subtopic.is_empty() {
            topic = format!("{topic}/{}", self.subtopic);
        }
        format!("{topic}/{}", delivered_subject.replace('.', "/"))
    }
}
