//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn parse_fetch_minimal() {
    let cmd = parse(&["outpost", "fetch", "https://example.com/list.txt"]);
    match cmd {
        CliCommand::Fetch { url, output, post } => {
            assert_eq!(url, "https://example.com/list.txt");
            assert!(output.is_none());
            assert!(post.is_none());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_fetch_with_output_and_post() {
    let cmd = parse(&[
        "outpost", "fetch", "https://example.com/submit",
        "--output", "body.bin",
        "--post", "token=abc",
    ]);
    match cmd {
        CliCommand::Fetch { output, post, .. } => {
            assert_eq!(output, Some(PathBuf::from("body.bin")));
            assert_eq!(post.as_deref(), Some("token=abc"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_refresh_with_and_without_overrides() {
    match parse(&["outpost", "refresh"]) {
        CliCommand::Refresh { urls } => assert!(urls.is_empty()),
        other => panic!("unexpected command: {other:?}"),
    }
    match parse(&["outpost", "refresh", "https://a.example/x", "https://b.example/y"]) {
        CliCommand::Refresh { urls } => assert_eq!(urls.len(), 2),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_listen_defaults() {
    match parse(&["outpost", "listen", "motd.txt"]) {
        CliCommand::Listen { banner, port, throttle_ms } => {
            assert_eq!(banner, PathBuf::from("motd.txt"));
            assert_eq!(port, 4747);
            assert_eq!(throttle_ms, 0);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_listen_with_options() {
    match parse(&["outpost", "listen", "motd.txt", "--port", "9000", "--throttle-ms", "250"]) {
        CliCommand::Listen { port, throttle_ms, .. } => {
            assert_eq!(port, 9000);
            assert_eq!(throttle_ms, 250);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn missing_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["outpost"]).is_err());
}
