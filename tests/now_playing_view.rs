use serde_json::json;

#[test]
fn nothing_playing_shows_idle_texts() {
    let view = spotify_overlay_lib::test_support::now_playing_from_json(None).expect("view");
    assert_eq!(view["active"], json!(false));
    assert_eq!(view["title"], json!("No Active Playback"));
    assert_eq!(view["artists"], json!("Play something in Spotify"));
    assert!(view["album_art_url"].is_null());
}

#[test]
fn long_titles_are_truncated_for_the_overlay() {
    let playback = json!({
        "is_playing": false,
        "device": { "id": "d1", "name": "Desktop", "is_active": true, "volume_percent": 35 },
        "item": {
            "id": "track-1",
            "name": "A Very Long Song Title That Goes On And On",
            "artists": [{ "name": "First Artist" }, { "name": "Second Artist" }],
            "album": { "name": "Album", "images": [{ "url": "https://i.scdn.co/image/large", "width": 640 }] }
        }
    });
    let view =
        spotify_overlay_lib::test_support::now_playing_from_json(Some(playback)).expect("view");

    assert_eq!(view["active"], json!(true));
    assert_eq!(view["is_playing"], json!(false));
    assert_eq!(view["title"], json!("A Very Long Song Title That ..."));
    assert_eq!(view["artists"], json!("First Artist, Second Artist"));
    assert_eq!(view["album_art_url"], json!("https://i.scdn.co/image/large"));
    assert_eq!(view["volume_percent"], json!(35));
    assert_eq!(view["device_name"], json!("Desktop"));
}

#[test]
fn default_shortcut_table_is_valid_and_conflicts_are_rejected() {
    let defaults = json!({
        "toggle_playback": "CommandOrControl+Shift+Space",
        "next_track": "CommandOrControl+Shift+N",
        "previous_track": "CommandOrControl+Shift+B",
        "show_queue": "CommandOrControl+Shift+Q",
        "show_playlists": "CommandOrControl+Shift+L"
    });
    spotify_overlay_lib::test_support::shortcut_bindings_check(defaults.clone()).expect("defaults");

    let mut conflicting = defaults;
    conflicting["show_playlists"] = json!("CommandOrControl+Shift+Q");
    let err = spotify_overlay_lib::test_support::shortcut_bindings_check(conflicting)
        .expect_err("conflict");
    assert_eq!(err.code(), "SEC_INVALID_INPUT");
}
