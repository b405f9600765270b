//! Chat command dispatch.
//!
//! Commands are plain functions registered in the static [`COMMANDS`] table,
//! which is also the single source of truth for the `!cmdslist` output.
//! [`dispatch`] is pure apart from randomness — everything it echoes comes in
//! through [`BotStatus`], so it can be unit tested without an HTTP layer or a
//! live session.

use rand::RngExt;

/// Snapshot of bot state that state-echoing commands report on.
#[derive(Debug, Clone, Default)]
pub struct BotStatus {
    pub authenticated: bool,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub subscriber_count: Option<u64>,
    pub live_chat_connected: bool,
}

/// Inputs available to a command handler.
pub struct CommandContext<'a> {
    /// Display name of the speaker.
    pub user: &'a str,
    /// Raw text after the command token, trimmed. Empty for most commands.
    pub args: &'a str,
    pub status: &'a BotStatus,
}

struct CommandDef {
    name: &'static str,
    aliases: &'static [&'static str],
    help: &'static str,
    /// Returns None when the handler can't produce a reply (bad arguments);
    /// the dispatcher then falls back to the unknown-command reply.
    run: fn(&CommandContext) -> Option<String>,
}

const COMMANDS: &[CommandDef] = &[
    CommandDef {
        name: "hello",
        aliases: &[],
        help: "say hi",
        run: cmd_hello,
    },
    CommandDef {
        name: "ping",
        aliases: &[],
        help: "check the bot is alive",
        run: cmd_ping,
    },
    CommandDef {
        name: "joke",
        aliases: &[],
        help: "a random joke",
        run: cmd_joke,
    },
    CommandDef {
        name: "8ball",
        aliases: &[],
        help: "ask the magic 8-ball",
        run: cmd_8ball,
    },
    CommandDef {
        name: "vibe",
        aliases: &[],
        help: "vibe check (0-100)",
        run: cmd_vibe,
    },
    CommandDef {
        name: "rate",
        aliases: &[],
        help: "rate it (1-10)",
        run: cmd_rate,
    },
    CommandDef {
        name: "random",
        aliases: &[],
        help: "a random number",
        run: cmd_random,
    },
    CommandDef {
        name: "pick",
        aliases: &[],
        help: "pick one: !pick a,b",
        run: cmd_pick,
    },
    CommandDef {
        name: "info",
        aliases: &[],
        help: "who the bot is logged in as",
        run: cmd_info,
    },
    CommandDef {
        name: "channel",
        aliases: &[],
        help: "the authenticated channel id",
        run: cmd_channel,
    },
    CommandDef {
        name: "cmdslist",
        aliases: &["commands"],
        help: "this list",
        run: cmd_cmdslist,
    },
];

const JOKES: &[&str] = &[
    "Why did the developer go broke? Because he used up all his cache.",
    "Why do programmers prefer dark mode? Because light attracts bugs.",
    "There are only 10 kinds of people: those who understand binary and those who don't.",
    "I would tell you a UDP joke, but you might not get it.",
];

const EIGHT_BALL: &[&str] = &[
    "It is certain.",
    "Outlook good.",
    "Ask again later.",
    "Don't count on it.",
    "Signs point to yes.",
    "Very doubtful.",
];

fn cmd_hello(ctx: &CommandContext) -> Option<String> {
    Some(format!("@{} Hey there! 👋", ctx.user))
}

fn cmd_ping(ctx: &CommandContext) -> Option<String> {
    Some(format!("@{} pong!", ctx.user))
}

fn cmd_joke(_ctx: &CommandContext) -> Option<String> {
    Some(pick_one(JOKES).to_string())
}

fn cmd_8ball(ctx: &CommandContext) -> Option<String> {
    Some(format!("@{} 🎱 {}", ctx.user, pick_one(EIGHT_BALL)))
}

fn cmd_vibe(ctx: &CommandContext) -> Option<String> {
    let score = rand::rng().random_range(0..=100);
    Some(format!("@{} vibe check: {}/100", ctx.user, score))
}

fn cmd_rate(ctx: &CommandContext) -> Option<String> {
    let score = rand::rng().random_range(1..=10);
    Some(format!("@{} I rate that {}/10", ctx.user, score))
}

fn cmd_random(ctx: &CommandContext) -> Option<String> {
    let n = rand::rng().random_range(0..99999);
    Some(format!("@{} your number is {}", ctx.user, n))
}

fn cmd_pick(ctx: &CommandContext) -> Option<String> {
    let options: Vec<&str> = ctx
        .args
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if options.len() < 2 {
        return None;
    }
    Some(format!("@{} I pick: {}", ctx.user, pick_one(&options)))
}

fn cmd_info(ctx: &CommandContext) -> Option<String> {
    let status = ctx.status;
    let info = match (&status.channel_title, status.authenticated) {
        (Some(title), _) => format!(
            "Bot logged in as {} (subs: {})",
            title,
            status.subscriber_count.unwrap_or(0)
        ),
        (None, true) => "Bot authenticated, channel unknown.".to_string(),
        (None, false) => "Bot not authenticated.".to_string(),
    };
    Some(format!("@{} {}", ctx.user, info))
}

fn cmd_channel(ctx: &CommandContext) -> Option<String> {
    let reply = match &ctx.status.channel_id {
        Some(id) => format!("@{} channel id: {}", ctx.user, id),
        None => format!("@{} no channel yet, log in first.", ctx.user),
    };
    Some(reply)
}

fn cmd_cmdslist(ctx: &CommandContext) -> Option<String> {
    let mut lines = vec![format!("@{} Available commands:", ctx.user)];
    for def in COMMANDS {
        let label = if def.aliases.is_empty() {
            format!("!{}", def.name)
        } else {
            let aliases: Vec<String> = def.aliases.iter().map(|a| format!("!{a}")).collect();
            format!("!{} ({})", def.name, aliases.join(", "))
        };
        lines.push(format!("{} - {}", label, def.help));
    }
    Some(lines.join("\n"))
}

fn pick_one<T: Copy>(items: &[T]) -> T {
    items[rand::rng().random_range(0..items.len())]
}

fn fallback(user: &str) -> String {
    format!("@{user} I didn't get that. Type !cmdslist to see what I can do.")
}

/// First `!word` token anywhere in the text, lowercased, plus the trimmed
/// remainder. A bare `!` with no word after it is skipped, not a dead end.
fn parse_command(text: &str) -> Option<(String, &str)> {
    for (bang, _) in text.match_indices('!') {
        let rest = &text[bang + 1..];
        let end = rest
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        if end == 0 {
            continue;
        }
        let token = rest[..end].to_ascii_lowercase();
        return Some((token, rest[end..].trim()));
    }
    None
}

/// First `@word` token anywhere in the text.
fn parse_mention(text: &str) -> Option<&str> {
    for (at, _) in text.match_indices('@') {
        let rest = &text[at + 1..];
        let end = rest
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        if end > 0 {
            return Some(&rest[..end]);
        }
    }
    None
}

fn lookup(token: &str) -> Option<&'static CommandDef> {
    COMMANDS
        .iter()
        .find(|def| def.name == token || def.aliases.contains(&token))
}

/// Map a chat message to a reply.
///
/// Precedence is deterministic: a recognized `!command` always wins, then an
/// `@mention`, then the fixed fallback. Only blank text produces no reply at
/// all, so callers feeding a live chat stream should filter what they pass in.
pub fn dispatch(user: &str, text: &str, status: &BotStatus) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some((token, args)) = parse_command(trimmed) {
        if let Some(def) = lookup(&token) {
            let ctx = CommandContext { user, args, status };
            return Some((def.run)(&ctx).unwrap_or_else(|| fallback(user)));
        }
    }

    if let Some(mention) = parse_mention(trimmed) {
        return Some(format!("@{mention} {user} says hi!"));
    }

    Some(fallback(user))
}
