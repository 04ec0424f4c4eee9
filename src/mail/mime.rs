//! MIME document composition.
//!
//! Turns an [`EmailEnvelope`] into a `lettre::Message` without any I/O.
//! Plain bodies become a single `text/plain` part. HTML bodies with inline
//! images become `multipart/related`; attachments wrap whatever body shape
//! resulted in `multipart/mixed`. Header display names and subjects are
//! RFC 2047 encoded by lettre.

use crate::mail::{EmailEnvelope, MailBody, MailError};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::Message;

enum BodyShape {
    Single(SinglePart),
    Multi(MultiPart),
}

/// Composes the MIME document for one envelope.
///
/// Inline images are only attached for HTML bodies; for plain bodies they
/// are ignored per the envelope contract. Attachment payloads get a
/// base64 transfer encoding and a `Content-Disposition: attachment` header
/// carrying the filename.
pub fn compose(envelope: &EmailEnvelope) -> Result<Message, MailError> {
    let mut builder = Message::builder()
        .from(envelope.sender.clone())
        .subject(envelope.subject.clone());
    for to in &envelope.recipients {
        builder = builder.to(to.clone());
    }
    for cc in &envelope.cc {
        builder = builder.cc(cc.clone());
    }

    let text_part = match &envelope.body {
        MailBody::Plain(content) => SinglePart::plain(content.clone()),
        MailBody::Html(content) => SinglePart::html(content.clone()),
    };

    let body = if envelope.body.is_html() && !envelope.inline_images.is_empty() {
        let mut related = MultiPart::related().singlepart(text_part);
        for (content_id, bytes) in &envelope.inline_images {
            // "graph.png" is referenced from the HTML as cid:graph.
            let stem = content_id.split('.').next().unwrap_or(content_id);
            related = related.singlepart(
                Attachment::new_inline(stem.to_string())
                    .body(bytes.clone(), content_type_for(content_id)),
            );
        }
        BodyShape::Multi(related)
    } else {
        BodyShape::Single(text_part)
    };

    let message = if envelope.attachments.is_empty() {
        match body {
            BodyShape::Single(part) => builder.singlepart(part)?,
            BodyShape::Multi(parts) => builder.multipart(parts)?,
        }
    } else {
        let mut mixed = match body {
            BodyShape::Single(part) => MultiPart::mixed().singlepart(part),
            BodyShape::Multi(parts) => MultiPart::mixed().multipart(parts),
        };
        for (filename, bytes) in &envelope.attachments {
            mixed = mixed.singlepart(
                Attachment::new(filename.clone()).body(bytes.clone(), content_type_for(filename)),
            );
        }
        builder.multipart(mixed)?
    };

    Ok(message)
}

/// Guesses a part's content type from its filename. Unknown extensions and
/// compression-encoded files (`.gz`, `.bz2`, `.xz`, `.Z`) are sent as
/// `application/octet-stream`; the compressed bytes travel opaquely rather
/// than under the encoded type.
fn content_type_for(filename: &str) -> ContentType {
    let octet_stream = || ContentType::parse("application/octet-stream").expect("static mime");
    let encoded = filename
        .rsplit('.')
        .next()
        .is_some_and(|ext| matches!(ext, "gz" | "bz2" | "xz" | "Z"));
    if encoded {
        return octet_stream();
    }
    let guessed = mime_guess::from_path(filename).first_or_octet_stream();
    ContentType::parse(guessed.essence_str()).unwrap_or_else(|_| octet_stream())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lettre::message::Mailbox;

    fn envelope(body: MailBody) -> EmailEnvelope {
        let sender = Mailbox::new(
            Some("Ops Monitor".to_string()),
            "alert@example.com".parse().unwrap(),
        );
        EmailEnvelope::new(
            sender,
            vec!["a@x.com".parse().unwrap(), "b@x.com".parse().unwrap()],
            "Alert",
            body,
        )
        .unwrap()
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).to_string()
    }

    #[test]
    fn plain_body_is_a_single_text_part() {
        let message = compose(&envelope(MailBody::Plain("disk down".into()))).unwrap();
        let rendered = formatted(&message);
        assert!(rendered.contains("text/plain"));
        assert!(!rendered.contains("multipart/"));
        assert!(rendered.contains("disk down"));
    }

    #[test]
    fn plain_body_ignores_inline_images() {
        let env = envelope(MailBody::Plain("disk down".into()))
            .with_inline_image("graph.png", vec![0x89, 0x50, 0x4e, 0x47]);
        let message = compose(&env).unwrap();
        let rendered = formatted(&message);
        assert!(!rendered.contains("Content-ID"));
        assert!(!rendered.contains("image/png"));
    }

    #[test]
    fn html_body_with_inline_image_is_multipart_related() {
        let env = envelope(MailBody::Html("<img src=\"cid:graph\">".into()))
            .with_inline_image("graph.png", vec![0x89, 0x50, 0x4e, 0x47]);
        let message = compose(&env).unwrap();
        let rendered = formatted(&message);
        assert!(rendered.contains("multipart/related"));
        assert!(rendered.contains("text/html"));
        assert!(rendered.contains("image/png"));
        // Content-ID is the filename with its extension stripped.
        assert!(rendered.contains("<graph>"));
        assert!(rendered.contains("inline"));
    }

    #[test]
    fn attachments_wrap_the_body_in_multipart_mixed() {
        let env = envelope(MailBody::Plain("see attached".into()))
            .with_attachment("report.pdf", b"%PDF-1.4".to_vec());
        let message = compose(&env).unwrap();
        let rendered = formatted(&message);
        assert!(rendered.contains("multipart/mixed"));
        assert!(rendered.contains("application/pdf"));
        assert!(rendered.contains("attachment"));
        assert!(rendered.contains("report.pdf"));
        assert!(rendered.contains("base64"));
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        let env = envelope(MailBody::Plain("see attached".into()))
            .with_attachment("core.dump777", vec![0, 1, 2]);
        let rendered = formatted(&compose(&env).unwrap());
        assert!(rendered.contains("application/octet-stream"));
    }

    #[test]
    fn compressed_attachments_are_sent_as_octet_stream() {
        let env = envelope(MailBody::Plain("see attached".into()))
            .with_attachment("logs.tar.gz", vec![0x1f, 0x8b])
            .with_attachment("trace.xz", vec![0xfd, 0x37, 0x7a]);
        let rendered = formatted(&compose(&env).unwrap());
        assert!(!rendered.contains("application/gzip"));
        assert!(!rendered.contains("application/x-xz"));
        assert_eq!(rendered.matches("application/octet-stream").count(), 2);
    }

    #[test]
    fn headers_round_trip_through_the_document() {
        let env = envelope(MailBody::Plain("down".into()))
            .with_cc(vec!["watcher@x.com".parse().unwrap()])
            .with_attachment("metrics.csv", b"a,b\n1,2\n".to_vec());
        let rendered = formatted(&compose(&env).unwrap());

        assert!(rendered.contains("Subject: Alert"));
        assert!(rendered.contains("Ops Monitor"));
        assert!(rendered.contains("alert@example.com"));
        assert!(rendered.contains("a@x.com"));
        assert!(rendered.contains("b@x.com"));
        assert!(rendered.contains("watcher@x.com"));
        assert!(rendered.contains("metrics.csv"));
    }

    #[test]
    fn html_with_images_and_attachments_nests_related_inside_mixed() {
        let env = envelope(MailBody::Html("<img src=\"cid:graph\">".into()))
            .with_inline_image("graph.png", vec![1, 2, 3])
            .with_attachment("report.pdf", b"%PDF-1.4".to_vec());
        let rendered = formatted(&compose(&env).unwrap());
        assert!(rendered.contains("multipart/mixed"));
        assert!(rendered.contains("multipart/related"));
        assert!(rendered.contains("<graph>"));
        assert!(rendered.contains("report.pdf"));
    }
}
