//! Delta and raw payloads must survive assembly into and parsing out of
//! wire bodies unchanged.

use difsync_diff::{diff_main, from_delta, text2, to_delta};
use difsync_protocol::{
    format_request, format_response, parse_request, parse_response, ClientLine,
    ResponseCommand,
};
use proptest::prelude::*;

fn delta_survives_request(source: &str, target: &str) {
    let delta = to_delta(&diff_main(source, target, true));
    let body = format_request(&[
        ClientLine::User {
            session_id: "abcdefgh".into(),
            echo: false,
        },
        ClientLine::File {
            server_version: 1,
            id: "doc".into(),
        },
        ClientLine::Delta {
            overwrite: false,
            client_version: 2,
            delta,
        },
    ]);
    let parsed = parse_request(&body).unwrap();
    let Some(ClientLine::Delta { delta, .. }) = parsed.lines.last() else {
        panic!("delta line missing from {body:?}");
    };
    let diffs = from_delta(source, delta).unwrap();
    assert_eq!(text2(&diffs), target);
}

#[test]
fn representative_strings() {
    let samples = ["", "plain", "ünïcödé 日本語", "line one\nline two\n", "a:b:c", "tab\tsep"];
    for source in samples {
        for target in samples {
            delta_survives_request(source, target);
        }
    }
}

proptest! {
    #[test]
    fn deltas_survive_requests(a in "[a-z:\\n é日]{0,30}", b in "[a-z:\\n é日]{0,30}") {
        delta_survives_request(&a, &b);
    }

    #[test]
    fn raw_text_survives_responses(text in "\\PC{0,40}") {
        let body = format_response(&[
            ResponseCommand::File { client_version: 3, id: "doc".into() },
            ResponseCommand::Raw { force: true, server_version: 9, text: text.clone() },
        ]);
        let parsed = parse_response(&body).unwrap();
        prop_assert!(parsed.skipped.is_empty());
        prop_assert_eq!(
            &parsed.commands[1],
            &ResponseCommand::Raw { force: true, server_version: 9, text }
        );
    }
}
