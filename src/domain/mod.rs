pub mod analysis;
pub mod epic;
pub mod project;
pub mod prompt_version;
pub mod proposal;
pub mod quality;
pub mod session;
pub mod task;
pub mod test_case;

pub use analysis::{Analysis, AnalysisStatus};
pub use epic::{Epic, WorkStatus};
pub use project::{is_valid_project_name, Project, ProjectSettings, SandboxKind};
pub use prompt_version::PromptVersion;
pub use proposal::{ChangeKind, Proposal, ProposalStatus};
pub use quality::{QualityCheck, QualityCheckKind, QualityCheckStatus, QualityMetrics};
pub use session::{Session, SessionMetrics, SessionStatus, SessionType};
pub use task::Task;
pub use test_case::TestCase;
