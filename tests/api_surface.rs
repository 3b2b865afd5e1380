//! Handle Surface Tests
//!
//! Drives the process-wide registry end to end the way a host shim would:
//! load and slice the dataset once, create emulators in both modes, step
//! them, rewrite their caches, and read every exported buffer. The registry
//! and its loader are process-global, so the whole conversation lives in a
//! single test function.

use cache_emu_rs::api;
use cache_emu_rs::NO_CONTENT;

#[test]
fn test_api_end_to_end() {
    // Slice 0: [1, 2, 1, 3]; slice 1: [1, 4].
    api::load_dataset(&[1, 2, 1], &[0, 0, 0]).unwrap();
    api::load_dataset(&[3, 1, 4], &[0, 1, 1]).unwrap(); // append-only ingest
    let num_slices = api::slice_dataset_by_time(0, 2, 1).unwrap();
    assert_eq!(num_slices, 2);

    let bad_handle = 999;
    assert!(api::step(bad_handle).is_err());

    let active = api::init_cache_emu(3, false).unwrap();
    let passive = api::init_cache_emu(2, true).unwrap();
    assert_ne!(active, passive);

    // The dataset froze when the first emulator appeared.
    assert!(api::load_dataset(&[9], &[0]).is_err());
    assert!(api::slice_dataset_by_time(0, 2, 1).is_err());

    // Features: the traditional trio plus two sliding windows.
    api::setup_traditional_feature_types(active, true, true, true).unwrap();
    api::setup_swlfu_feature_types(active, &[2, 4]).unwrap();
    assert_eq!(api::feature_dims(active).unwrap(), 5);
    assert_eq!(api::feature_dims(passive).unwrap(), 0);

    // --- Active conversation ---------------------------------------------
    let r = api::step(active).unwrap();
    assert_eq!((r.processed, r.missed, r.remaining), (4, 3, 0));
    assert_eq!(api::get_step_elements(active).unwrap(), vec![1, 2, 1, 3]);
    assert_eq!(api::get_num_step_elements(active).unwrap(), 4);
    assert_eq!(
        api::get_candidates(active).unwrap(),
        vec![NO_CONTENT, NO_CONTENT, NO_CONTENT, 1, 2, 3]
    );
    assert_eq!(
        api::get_candidate_frequencies(active).unwrap(),
        vec![0.0, 0.0, 0.0, 2.0, 1.0, 1.0]
    );

    api::update_cache(active, &[1, 2, 3]).unwrap();
    assert_eq!(api::get_cache_contents(active).unwrap(), vec![1, 2, 3]);

    let features = api::get_features(active, &[1, 8]).unwrap();
    assert_eq!(features.len(), 2 * 5); // row-major (contents x dims)
    assert!(features[..5].iter().any(|&f| f > 0.0)); // content 1 has history
    assert_eq!(&features[5..], &[0.0; 5]); // content 8 has none

    assert!(!api::finished(active).unwrap());
    let r = api::step(active).unwrap();
    assert_eq!((r.processed, r.missed), (2, 1));
    assert!(api::finished(active).unwrap());

    let rate = api::get_mean_hit_rate(active).unwrap();
    assert!((rate - 1.0 / 6.0).abs() < 1e-3);

    assert_eq!(api::get_i_episode(active).unwrap(), 0);
    let episode_rate = api::on_episode_end(active).unwrap();
    assert!((episode_rate - rate).abs() < 1e-6);
    assert_eq!(api::get_i_episode(active).unwrap(), 1);

    // --- Passive conversation (independent over the same loader) ---------
    let r = api::step(passive).unwrap();
    assert_eq!((r.processed, r.missed, r.remaining), (1, 1, 3));
    assert_eq!(api::get_candidate_frequencies(passive).unwrap().len(), 3);
    api::update_cache(passive, &[1, NO_CONTENT]).unwrap();
    let r = api::step(passive).unwrap();
    assert_eq!((r.processed, r.missed, r.remaining), (2, 1, 1));

    // --- Reset keeps handles and extractors ------------------------------
    api::reset(active).unwrap();
    assert_eq!(api::get_i_episode(active).unwrap(), 0);
    assert_eq!(api::feature_dims(active).unwrap(), 5);
    assert_eq!(
        api::get_cache_contents(active).unwrap(),
        vec![NO_CONTENT; 3]
    );
    assert!(!api::finished(active).unwrap());
    let r = api::step(active).unwrap();
    assert_eq!(r.processed, 4);
}
