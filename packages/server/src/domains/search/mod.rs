//! The search domain: job lifecycle, batch pipeline, and agents.

pub mod artifacts;
pub mod controller;
pub mod driver;
pub mod job;
pub mod pipeline;
pub mod prompts;
pub mod quiz;
pub mod results;
pub mod swarm;

pub use artifacts::{ArtifactType, SearchArtifact};
pub use controller::{
    ControllerError, JobController, RankedDomain, ResultsResponse, StartedJob, StatusSnapshot,
    StreamSnapshot,
};
pub use driver::{DriverAgent, PreviousResults};
pub use job::{JobStatus, QuizResponses, SearchJob};
pub use pipeline::{BatchReport, ADMISSION_SCORE, GOOD_SCORE};
pub use quiz::{FollowupQuiz, FollowupQuizGenerator};
pub use results::{Availability, DomainRecord, EvaluationData, PriceCategory};
pub use swarm::{DomainEvaluation, SwarmAgent};
