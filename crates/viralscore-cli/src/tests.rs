use super::*;
use viralscore_core::Platform;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["viralscore-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["viralscore-cli", "migrate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Migrate)));
}

#[test]
fn parses_strategy_duration() {
    let cli = Cli::try_parse_from(["viralscore-cli", "strategy", "--duration", "301"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Strategy { duration }) if (duration - 301.0).abs() < f64::EPSILON
    ));
}

#[test]
fn fingerprint_collects_repeated_links() {
    let cli = Cli::try_parse_from([
        "viralscore-cli",
        "fingerprint",
        "--title",
        "Night Market",
        "--link",
        "douyin=https://v.douyin.com/xyz/",
        "--link",
        "bilibili=https://www.bilibili.com/video/BV1xx",
    ])
    .unwrap();

    let Some(Commands::Fingerprint { title, links }) = cli.command else {
        panic!("expected fingerprint command");
    };
    assert_eq!(title, "Night Market");
    assert_eq!(
        links,
        vec![
            PlatformLink::new(Platform::Douyin, "https://v.douyin.com/xyz/"),
            PlatformLink::new(Platform::Bilibili, "https://www.bilibili.com/video/BV1xx"),
        ]
    );
}

#[test]
fn link_without_platform_prefix_is_rejected() {
    let result = Cli::try_parse_from([
        "viralscore-cli",
        "fingerprint",
        "--title",
        "x",
        "--link",
        "https://v.douyin.com/xyz/",
    ]);
    assert!(result.is_err());
}

#[test]
fn link_with_unknown_platform_is_rejected() {
    assert!(parse_link("youtube=https://youtu.be/abc").is_err());
    assert!(parse_link("douyin=").is_err());
}

#[test]
fn reward_score_must_be_in_range() {
    assert!(Cli::try_parse_from(["viralscore-cli", "reward", "--score", "100"]).is_ok());
    assert!(Cli::try_parse_from(["viralscore-cli", "reward", "--score", "101"]).is_err());
    assert!(Cli::try_parse_from(["viralscore-cli", "reward", "--score", "-1"]).is_err());
}

#[test]
fn adjust_preview_accepts_none_as_previous() {
    let cli = Cli::try_parse_from([
        "viralscore-cli",
        "adjust-preview",
        "--previous",
        "none",
        "--new",
        "91",
        "--balance",
        "-20",
    ])
    .unwrap();

    assert!(matches!(
        cli.command,
        Some(Commands::AdjustPreview {
            previous: PreviousScore(None),
            new_score: 91,
            balance: -20,
        })
    ));
}

#[test]
fn parse_previous_reads_scores_and_none() {
    assert_eq!(parse_previous("85"), Ok(PreviousScore(Some(85))));
    assert_eq!(parse_previous("NONE"), Ok(PreviousScore(None)));
    assert!(parse_previous("abc").is_err());
}

#[test]
fn showcase_status_defaults_to_scored() {
    let cli = Cli::try_parse_from(["viralscore-cli", "showcase", "--score", "95", "--license"])
        .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Showcase {
            score: 95,
            license: true,
            status: SubmissionStatus::Scored,
        })
    ));
}

#[test]
fn showcase_parses_explicit_status() {
    let cli = Cli::try_parse_from([
        "viralscore-cli",
        "showcase",
        "--score",
        "95",
        "--status",
        "manual_review",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Showcase {
            license: false,
            status: SubmissionStatus::ManualReview,
            ..
        })
    ));
}

#[test]
fn score_force_defaults_to_false() {
    let cli = Cli::try_parse_from(["viralscore-cli", "score", "--id", "12"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Score {
            id: 12,
            force: false
        })
    ));

    let cli = Cli::try_parse_from(["viralscore-cli", "score", "--id", "12", "--force"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Score { force: true, .. })
    ));
}

#[test]
fn adjust_keeps_out_of_range_scores_for_the_engine_to_reject() {
    let cli =
        Cli::try_parse_from(["viralscore-cli", "adjust", "--id", "3", "--score", "150"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Adjust { id: 3, score: 150 })
    ));
}

#[test]
fn validate_reports_violations_as_an_error() {
    let dir = std::env::temp_dir().join(format!("viralscore-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("submission.json");
    std::fs::write(
        &file,
        r#"{
            "user_id": 1,
            "title": "Night Market",
            "video_url": "https://cdn.example/v/1.mp4",
            "duration_seconds": 120.0,
            "platform_links": [],
            "screenshot_urls": [],
            "license_agreed": true
        }"#,
    )
    .unwrap();

    let err = rules::validate(&file, None).unwrap_err();
    assert!(err.to_string().contains("2 rule(s)"), "{err}");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn strategy_rejects_durations_over_ten_minutes() {
    assert!(rules::strategy(120.0).is_ok());
    assert!(rules::strategy(601.0).is_err());
}
