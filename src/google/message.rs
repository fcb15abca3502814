//! RFC 822-ish message assembly for the Gmail send endpoint.
//!
//! Gmail takes the whole message as one base64url-encoded `raw` field.
//! Header lines are CRLF-joined and the encoding uses no padding, per the
//! endpoint's transport requirements.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

/// An outgoing message before encoding. Exactly one of `html_body` /
/// `text_body` is used; HTML wins when both are present.
pub struct OutgoingMail<'a> {
    pub to: &'a str,
    pub cc: Option<&'a str>,
    pub bcc: Option<&'a str>,
    pub subject: &'a str,
    pub html_body: Option<&'a str>,
    pub text_body: Option<&'a str>,
}

/// Assemble headers + body and base64url-encode without padding.
pub fn encode_message(mail: &OutgoingMail) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("To: {}", mail.to));
    if let Some(cc) = mail.cc {
        lines.push(format!("Cc: {}", cc));
    }
    if let Some(bcc) = mail.bcc {
        lines.push(format!("Bcc: {}", bcc));
    }
    lines.push(format!("Subject: {}", mail.subject));

    let (content_type, body) = match (mail.html_body, mail.text_body) {
        (Some(html), _) => ("text/html; charset=UTF-8", html),
        (None, Some(text)) => ("text/plain; charset=UTF-8", text),
        (None, None) => ("text/plain; charset=UTF-8", ""),
    };
    lines.push(format!("Content-Type: {}", content_type));
    lines.push(String::new());
    lines.push(body.to_string());

    URL_SAFE_NO_PAD.encode(lines.join("\r\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> String {
        String::from_utf8(URL_SAFE_NO_PAD.decode(raw).expect("invalid base64url")).unwrap()
    }

    #[test]
    fn test_html_message_layout() {
        let raw = encode_message(&OutgoingMail {
            to: "x@example.com",
            cc: None,
            bcc: None,
            subject: "hi",
            html_body: Some("<b>hi</b>"),
            text_body: None,
        });

        let message = decode(&raw);
        assert_eq!(
            message,
            "To: x@example.com\r\nSubject: hi\r\nContent-Type: text/html; charset=UTF-8\r\n\r\n<b>hi</b>"
        );
    }

    #[test]
    fn test_plain_text_fallback() {
        let raw = encode_message(&OutgoingMail {
            to: "x@example.com",
            cc: None,
            bcc: None,
            subject: "plain",
            html_body: None,
            text_body: Some("just text"),
        });

        let message = decode(&raw);
        assert!(message.contains("Content-Type: text/plain; charset=UTF-8"));
        assert!(message.ends_with("\r\n\r\njust text"));
    }

    #[test]
    fn test_cc_and_bcc_headers() {
        let raw = encode_message(&OutgoingMail {
            to: "to@example.com",
            cc: Some("cc@example.com"),
            bcc: Some("bcc@example.com"),
            subject: "s",
            html_body: None,
            text_body: Some("b"),
        });

        let message = decode(&raw);
        let lines: Vec<&str> = message.split("\r\n").collect();
        assert_eq!(lines[0], "To: to@example.com");
        assert_eq!(lines[1], "Cc: cc@example.com");
        assert_eq!(lines[2], "Bcc: bcc@example.com");
        assert_eq!(lines[3], "Subject: s");
    }

    #[test]
    fn test_encoding_is_urlsafe_without_padding() {
        // A body length chosen so standard base64 would need padding
        let raw = encode_message(&OutgoingMail {
            to: "x@example.com",
            cc: None,
            bcc: None,
            subject: "pad",
            html_body: None,
            text_body: Some("a"),
        });

        assert!(!raw.contains('='));
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
    }

    #[test]
    fn test_html_wins_over_text() {
        let raw = encode_message(&OutgoingMail {
            to: "x@example.com",
            cc: None,
            bcc: None,
            subject: "both",
            html_body: Some("<i>html</i>"),
            text_body: Some("text"),
        });

        let message = decode(&raw);
        assert!(message.contains("text/html"));
        assert!(message.ends_with("<i>html</i>"));
    }
}
