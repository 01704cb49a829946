//! ============================================================================
//! Session Loop - Identify, then converse until "quit"
//! ============================================================================
//! One loop serves both modes:
//! - persistent: identify or register the student, greet with a follow-up
//!   from the last session, and log every exchange
//! - stateless: no identification and no history
//!
//! Input and output are generic so the loop runs against stdin/stdout in the
//! CLI and against byte buffers in tests.
//! ============================================================================

use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::follow_up::follow_up_question;
use crate::history::HistoryStore;
use crate::persona::PersonaResponder;
use crate::registry::{new_user_greeting, returning_user_greeting, UserRegistry};
use crate::types::{CareError, CareResult, User};

/// Command that ends the conversation (case-insensitive)
pub const QUIT_COMMAND: &str = "quit";

pub const PERSISTENT_BANNER: &str =
    "Welcome my friend! I'm here to support students with mental health concerns.";
pub const STATELESS_BANNER: &str = "Welcome my friend! Type 'quit' to exit.";

/// Store-backed collaborators for a persistent session
pub struct Persistence {
    pub registry: UserRegistry,
    pub history: HistoryStore,
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The student typed the quit command
    Quit,
    /// Input closed
    EndOfInput,
    /// Identification or registration failed; nothing was discussed
    IdentificationFailed,
}

/// A single interactive session
pub struct Session<R, W> {
    responder: PersonaResponder,
    persistence: Option<Persistence>,
    input: R,
    output: W,
    banner: bool,
}

impl<R, W> Session<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(responder: PersonaResponder, persistence: Option<Persistence>, input: R, output: W) -> Self {
        Self {
            responder,
            persistence,
            input,
            output,
            banner: true,
        }
    }

    /// Skip the opening banner when `skip` is set (the caller already printed it)
    pub fn without_banner(mut self, skip: bool) -> Self {
        self.banner = !skip;
        self
    }

    /// Run the session to completion
    pub async fn run(mut self) -> CareResult<SessionEnd> {
        if self.persistence.is_none() {
            if self.banner {
                writeln!(self.output, "{}", STATELESS_BANNER)?;
            }
            return self.converse(None).await;
        }

        if self.banner {
            writeln!(self.output, "{}", PERSISTENT_BANNER)?;
        }
        match self.identify().await? {
            Identified::User(user, greeting) => {
                writeln!(self.output, "{}", greeting)?;
                self.converse(Some(user)).await
            }
            Identified::Failed(message) => {
                writeln!(self.output, "{}", message)?;
                Ok(SessionEnd::IdentificationFailed)
            }
            Identified::EndOfInput => Ok(SessionEnd::EndOfInput),
        }
    }

    async fn identify(&mut self) -> CareResult<Identified> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Ok(Identified::Failed("Persistence is not configured.".to_string()));
        };

        writeln!(self.output, "Please provide your phone number or email to continue.")?;
        let Some(identifier) = prompt(&mut self.input, &mut self.output, "Phone number or email: ").await? else {
            return Ok(Identified::EndOfInput);
        };

        let existing = match persistence.registry.identify(&identifier).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!("User lookup failed: {}", e);
                return Ok(Identified::Failed(format!("Error looking up user: {}", e)));
            }
        };

        if let Some(user) = existing {
            let last = persistence.history.last_within_window(user.id).await;
            let greeting = returning_user_greeting(&user.name, follow_up_question(last.as_ref()));
            info!("Returning user {} identified", user.id);
            return Ok(Identified::User(user, greeting));
        }

        writeln!(self.output, "It looks like you're new! Please provide some details.")?;
        let mut details = Vec::with_capacity(3);
        for label in ["Your name: ", "Your phone number: ", "Your email: "] {
            match prompt(&mut self.input, &mut self.output, label).await? {
                Some(value) => details.push(value),
                None => return Ok(Identified::EndOfInput),
            }
        }

        match persistence.registry.register(&details[0], &details[1], &details[2]).await {
            Ok(user) => {
                let greeting = new_user_greeting(&user.name);
                Ok(Identified::User(user, greeting))
            }
            Err(CareError::Validation(message)) => Ok(Identified::Failed(message)),
            Err(e) => Ok(Identified::Failed(format!("Error saving user data: {}", e))),
        }
    }

    async fn converse(&mut self, user: Option<User>) -> CareResult<SessionEnd> {
        let name = user.as_ref().map(|u| u.name.as_str());

        loop {
            let Some(message) = prompt(&mut self.input, &mut self.output, "> ").await? else {
                return Ok(SessionEnd::EndOfInput);
            };

            if message.eq_ignore_ascii_case(QUIT_COMMAND) {
                match name {
                    Some(name) => writeln!(self.output, "Goodbye, {}! Take care.", name)?,
                    None => writeln!(self.output, "Goodbye!")?,
                }
                return Ok(SessionEnd::Quit);
            }

            let response = self.responder.respond(&message, name).await;
            writeln!(self.output, "Psychiatrist: {}", response)?;

            if let (Some(persistence), Some(user)) = (&self.persistence, &user) {
                persistence.history.append(user.id, &message, &response).await;
            }
        }
    }
}

enum Identified {
    User(User, String),
    Failed(String),
    EndOfInput,
}

/// Print `label`, read one line, and return it trimmed. `None` on end of input.
async fn prompt<R, W>(input: &mut R, output: &mut W, label: &str) -> CareResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    write!(output, "{}", label)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
