//! Playlist Decoder Tests

use cinestream::models::Episode;
use cinestream::stream::playlist::decode;

#[test]
fn test_only_stream_format_group_kept() {
    let sources = decode(
        "优质线路$$$m3u8高清",
        "t1$u1#t2$u2$$$e1$http://a/1.m3u8#e2$http://a/2.m3u8",
    );

    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].group_name, "m3u8高清");
    assert_eq!(
        sources[0].episodes,
        vec![
            Episode {
                title: "e1".into(),
                url: "http://a/1.m3u8".into(),
                index: 0,
            },
            Episode {
                title: "e2".into(),
                url: "http://a/2.m3u8".into(),
                index: 1,
            },
        ]
    );
}

#[test]
fn test_multiple_stream_groups_keep_order() {
    let sources = decode(
        "m3u8 line 1$$$flash$$$M3U8 line 2",
        "a$http://x/1.m3u8$$$b$http://x/1.swf$$$c$https://y/1.m3u8#d$https://y/2.m3u8",
    );

    let groups: Vec<&str> = sources.iter().map(|s| s.group_name.as_str()).collect();
    assert_eq!(groups, vec!["m3u8 line 1", "M3U8 line 2"]);
    assert_eq!(sources[1].episodes.len(), 2);
}

#[test]
fn test_episode_count_matches_retained_tokens() {
    let cases = [
        ("m3u8", "a$http://h/1#b$http://h/2#c$http://h/3", 3),
        ("m3u8", "a$http://h/1##b$nope#", 1),
        ("m3u8$$$m3u8", "a$http://h/1$$$b$http://h/2#c$https://h/3", 3),
        ("other$$$m3u8", "a$http://h/1$$$", 0),
        ("$$$$$$", "$$$$$$", 0),
        ("m3u8", "$#$$#$$$#", 0),
    ];

    for (names, urls, expected) in cases {
        let total: usize = decode(names, urls).iter().map(|s| s.episodes.len()).sum();
        assert_eq!(total, expected, "names={:?} urls={:?}", names, urls);
    }
}

#[test]
fn test_reversed_view_keeps_indices() {
    let sources = decode("m3u8", "a$http://h/1#b$http://h/2#c$http://h/3");
    let source = &sources[0];

    let reversed: Vec<usize> = source.episodes_view(true).iter().map(|e| e.index).collect();
    assert_eq!(reversed, vec![2, 1, 0]);
    assert_eq!(source.episode(1).map(|e| e.title.as_str()), Some("b"));
}
