//! Comment formatting for bot responses.

use crate::webhooks::Comment;

/// Blurb linking to the commands the bot understands, appended to every
/// response inside a `<details>` block.
pub const ABOUT_THIS_BOT: &str =
    "I understand the commands that are listed [here](https://github.com/5dlabs/mergebot/blob/main/docs/commands.md)";

/// Format a response that does not warrant additional explanation in the
/// details section.
#[must_use]
pub fn format_simple_response(to: &str, message: &str) -> String {
    format!("@{to}: {message}\n\n<details>\n\n{ABOUT_THIS_BOT}\n</details>")
}

/// Format a response with an extra reason in the details section.
#[must_use]
pub fn format_response(to: &str, message: &str, reason: &str) -> String {
    format!("@{to}: {message}\n\n<details>\n\n{reason}\n\n{ABOUT_THIS_BOT}\n</details>")
}

/// Format a reply to a comment, quoting the original body and linking back to
/// it.
#[must_use]
pub fn format_response_raw(body: &str, body_url: &str, login: &str, reply: &str) -> String {
    let quoted: Vec<String> = body.lines().map(|l| format!(">{l}")).collect();
    let reason = format!("In response to [this]({body_url}):\n\n{}\n", quoted.join("\n"));
    format_response(login, reply, &reason)
}

/// Format a reply to an issue comment.
#[must_use]
pub fn format_ic_response(comment: &Comment, reply: &str) -> String {
    format_response_raw(&comment.body, &comment.html_url, &comment.user.login, reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::User;

    #[test]
    fn test_simple_response_mentions_user() {
        let response = format_simple_response("octocat", "please add a release note");
        assert!(response.starts_with("@octocat: please add a release note"));
        assert!(response.contains("<details>"));
        assert!(response.contains(ABOUT_THIS_BOT));
    }

    #[test]
    fn test_raw_response_quotes_every_line() {
        let response = format_response_raw(
            "/label foo\n/label bar",
            "https://github.com/acme/widgets/pull/1#issuecomment-9",
            "dev",
            "no such label",
        );
        assert!(response.contains(">/label foo\n>/label bar"));
        assert!(response.contains("In response to [this](https://github.com/acme/widgets/pull/1#issuecomment-9)"));
        assert!(response.starts_with("@dev: no such label"));
    }

    #[test]
    fn test_ic_response_uses_comment_author() {
        let comment = Comment {
            body: "/release-note-none".to_string(),
            user: User {
                login: "someone".to_string(),
            },
            html_url: "https://example.com/c/1".to_string(),
        };
        let response = format_ic_response(&comment, "denied");
        assert!(response.starts_with("@someone: denied"));
        assert!(response.contains(">/release-note-none"));
    }
}
