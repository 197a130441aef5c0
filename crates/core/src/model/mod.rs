mod flowchart;
mod host;
mod ids;
mod participant;
mod question;
mod session;
mod study;
mod text;

pub use ids::{ItemId, ParseIdError, ParticipantId, SessionId};
pub use text::{TextError, non_blank};

pub use flowchart::FlowchartData;
pub use host::{HostError, HostPhase};
pub use participant::Participant;
pub use question::{QuizQuestion, QuizQuestionError};
pub use session::{AnswerOutcome, QuizSession, QuizSessionError, Standing};
pub use study::{FlashcardItem, NotesItem};
