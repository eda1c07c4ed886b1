use std::io::Write as _;

use super::*;

#[test]
fn default_table_compiles_every_pattern() {
    let patterns = PlatformPatterns::default();
    for (platform, raw) in DEFAULT_PATTERNS {
        assert_eq!(
            patterns.patterns.get(platform).map(Vec::len),
            Some(raw.len()),
            "pattern dropped for {platform}"
        );
    }
}

#[test]
fn default_table_covers_every_platform() {
    let patterns = PlatformPatterns::default();
    for platform in Platform::ALL {
        assert!(patterns.patterns.contains_key(&platform), "{platform}");
    }
}

#[test]
fn douyin_links_match() {
    let p = PlatformPatterns::default();
    assert!(p.matches(Platform::Douyin, "https://www.douyin.com/video/7300000000"));
    assert!(p.matches(Platform::Douyin, "https://v.douyin.com/iRNBho6u/"));
    assert!(p.matches(Platform::Douyin, "v.douyin.com/abc"));
    assert!(p.matches(Platform::Douyin, "HTTPS://WWW.DOUYIN.COM/video/1"));
}

#[test]
fn weixin_channels_links_match() {
    let p = PlatformPatterns::default();
    assert!(p.matches(
        Platform::WeixinChannels,
        "https://channels.weixin.qq.com/web/pages/feed?id=1"
    ));
    assert!(p.matches(Platform::WeixinChannels, "https://finder.video.qq.com/x"));
    assert!(!p.matches(Platform::WeixinChannels, "https://video.qq.com/x"));
}

#[test]
fn xiaohongshu_and_bilibili_short_links_match() {
    let p = PlatformPatterns::default();
    assert!(p.matches(Platform::Xiaohongshu, "http://xhslink.com/a/AbCd"));
    assert!(p.matches(Platform::Bilibili, "https://b23.tv/BV1xx411c7mD"));
    assert!(p.matches(
        Platform::Bilibili,
        "https://www.bilibili.com/video/BV1xx411c7mD"
    ));
}

#[test]
fn link_for_other_platform_does_not_match() {
    let p = PlatformPatterns::default();
    assert!(!p.matches(Platform::Bilibili, "https://www.douyin.com/video/1"));
}

#[test]
fn domain_in_query_string_does_not_match() {
    let p = PlatformPatterns::default();
    assert!(!p.matches(
        Platform::Douyin,
        "https://evil.example.com/?next=douyin.com"
    ));
    assert!(!p.matches(Platform::Douyin, "https://douyin.com.evil.example/x"));
}

#[test]
fn userinfo_and_port_are_ignored() {
    let p = PlatformPatterns::default();
    assert!(p.matches(Platform::Douyin, "https://user@www.douyin.com:443/v/1"));
    assert!(!p.matches(Platform::Douyin, "https://www.douyin.com@evil.example/v/1"));
}

#[test]
fn backslash_tricks_resolve_to_the_real_host() {
    let p = PlatformPatterns::default();
    assert!(!p.matches(Platform::Douyin, r"https://evil.example\@v.douyin.com/abc"));
    assert!(!p.matches(Platform::Douyin, r"https://evil.example\.douyin.com/x"));
    assert!(!p.matches(Platform::Bilibili, r"evil.example\@b23.tv/BV1"));
}

#[test]
fn non_http_scheme_and_garbage_do_not_match() {
    let p = PlatformPatterns::default();
    assert!(!p.matches(Platform::Douyin, "ftp://www.douyin.com/v/1"));
    assert!(!p.matches(Platform::Douyin, ""));
    assert!(!p.matches(Platform::Douyin, "https:///video"));
}

#[test]
fn platform_parses_from_str() {
    assert_eq!("weixin_channels".parse::<Platform>(), Ok(Platform::WeixinChannels));
    assert_eq!(" Douyin ".parse::<Platform>(), Ok(Platform::Douyin));
    assert!(matches!(
        "youtube".parse::<Platform>(),
        Err(CoreError::UnknownPlatform(ref p)) if p == "youtube"
    ));
}

#[test]
fn compile_rejects_missing_platform() {
    let mut platforms = HashMap::new();
    platforms.insert(Platform::Douyin, vec![r"douyin\.com$".to_string()]);
    let err = PlatformPatterns::compile(&PlatformsFile { platforms }).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("bilibili")));
}

#[test]
fn compile_rejects_invalid_regex() {
    let platforms = Platform::ALL
        .into_iter()
        .map(|p| (p, vec!["(unclosed".to_string()]))
        .collect();
    let err = PlatformPatterns::compile(&PlatformsFile { platforms }).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("invalid pattern")));
}

#[test]
fn load_platform_patterns_reads_yaml_override() {
    let dir = std::env::temp_dir().join(format!("viralscore-platforms-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let path = dir.join("platforms.yaml");
    let mut file = std::fs::File::create(&path).expect("create file");
    writeln!(
        file,
        "platforms:\n  douyin: ['^example\\.com$']\n  bilibili: ['^example\\.org$']\n  xiaohongshu: ['^example\\.net$']\n  weixin_channels: ['^example\\.io$']"
    )
    .expect("write yaml");

    let patterns = load_platform_patterns(&path).expect("load override");
    assert!(patterns.matches(Platform::Douyin, "https://example.com/v"));
    assert!(!patterns.matches(Platform::Douyin, "https://www.douyin.com/v"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn load_platform_patterns_reports_missing_file() {
    let err = load_platform_patterns(Path::new("/nonexistent/platforms.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::PlatformsFileIo { .. }));
}

#[test]
fn load_platform_patterns_rejects_unknown_platform_key() {
    let dir = std::env::temp_dir().join(format!("viralscore-platforms-bad-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let path = dir.join("platforms.yaml");
    std::fs::write(&path, "platforms:\n  youtube: ['youtube\\.com']\n").expect("write yaml");

    let err = load_platform_patterns(&path).unwrap_err();
    assert!(matches!(err, ConfigError::PlatformsFileParse(_)));

    std::fs::remove_dir_all(&dir).ok();
}
