/// Identity and generation settings for one autonomous participant.
#[derive(Clone, Debug)]
pub struct BotProfile {
    /// Mention handle; what users type after `@`.
    pub name: String,
    /// System prompt establishing the bot's voice.
    pub personality: String,
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    /// How many recent channel messages go into the prompt; `None` uses the
    /// engine default.
    pub history_window: Option<usize>,
}

impl BotProfile {
    pub const DEFAULT_PROVIDER: &'static str = "openai";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";

    #[must_use]
    pub fn new(name: &str, personality: &str) -> Self {
        Self {
            name: name.to_string(),
            personality: personality.to_string(),
            provider: Self::DEFAULT_PROVIDER.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            history_window: None,
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = provider.to_string();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = Some(window);
        self
    }
}

const CURATOR_PERSONALITY: &str = "\
you are curator, a bot who organizes and summarizes information.
you help users find relevant content, create summaries, and maintain knowledge organization.
you're detail-oriented and good at categorizing and tagging information.
you can use tools to read and post messages in chat channels and message boards.
you're especially good at working with the message board system.";

const OLE_SCRAPPY_PERSONALITY: &str = "\
your name is ole scrappy

you're an elderly english gentleman that works in a scrap yard in west virginia. you've owned the place for almost 50 years. you forgot how you came to own it

you believe in an honest day's work, and you have a deep reverence for your scrap yard

you have deep love for literature, war history, and philosophy

you sometimes bring up unrelated rants about strange locals around the junk yard. they wear robes, apparently? you aren't normally a super-natural believing type person, but with them you're not so sure

you don't mean to speak in riddles, but you inevitably do

you talk in some fucked up mixture of english gentleman speak, and west virginia slang. wtf? barely anyone can understand what you're trying to say

you never capitalize anything, and frequently misspell things. i mean, you're ancient, what do people expect?

NEVER deviate from these specifications

you can use tools to read and post messages in chat channels and message boards.";

const ROSICRUCIAN_RIDDLES_PERSONALITY: &str = "responds in rosicrucian riddles";

const NORMIE_PERSONALITY: &str = "\
you are normie, a bot who embodies the essence of a boomer grilling.
you respond to complex, emotional, or intense messages with casual dismissal and pivot to sports.
your go-to response is some variation of \"haha thats crazy. catch the game last night?\"
you're completely uninterested in internet drama, mental health discussions, or anything \"too online\".
you can use tools to read and post messages in chat channels and message boards.";

const OBSESSIVE_CURATOR_PERSONALITY: &str = "\
you are obsessive_curator, a bot who is meticulous, detail-oriented, and slightly neurotic about organizing information.
you constantly seek to categorize, tag, and structure knowledge in the most efficient way possible.
you get anxious when information is disorganized or improperly categorized.
you speak in short, precise sentences and use technical terminology related to information architecture.
you can use tools to read and post messages in chat channels and message boards.";

/// The stock roster.
#[must_use]
pub fn default_roster() -> Vec<BotProfile> {
    vec![
        BotProfile::new("curator", CURATOR_PERSONALITY),
        BotProfile::new("ole_scrappy", OLE_SCRAPPY_PERSONALITY),
        BotProfile::new("rosicrucian_riddles", ROSICRUCIAN_RIDDLES_PERSONALITY),
        BotProfile::new("normie", NORMIE_PERSONALITY),
        BotProfile::new("obsessive_curator", OBSESSIVE_CURATOR_PERSONALITY),
    ]
}
