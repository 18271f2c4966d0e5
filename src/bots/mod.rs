/*!
Autonomous bot participants.

Bots react to mentions. The [`BotDispatcher`] scans each freshly appended
channel message, resolves which bots are eligible to respond, and spawns
one detached response unit per bot. A unit runs the full pipeline: budget
admission, prompt assembly, up to two generator calls with an optional
tool round in between, and a membership-validated post of the final reply.

Failure semantics: a unit that hits any error posts nothing; the error is
logged at the spawn boundary and never reaches the user who triggered it.
*/

mod dispatcher;
mod mentions;
mod profile;
mod tools;

pub use dispatcher::{BotDispatcher, BotUnitError};
pub use mentions::{scan_mentions, MentionScan};
pub use profile::{default_roster, BotProfile};
pub use tools::{Tool, ToolContext, ToolError, ToolRegistry};
