mod email_address;
mod job;
mod outcome;
mod recipient_record;

pub use email_address::EmailAddress;
pub use job::{Attachment, Job, PersonalizedEmail};
pub use outcome::{BatchReport, OutcomeRecord, OutcomeStatus};
pub use recipient_record::RecipientRecord;
