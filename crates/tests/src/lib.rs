//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟硬件 e2e 测试（无需真实设备）

#[cfg(test)]
mod contract_tests {
    use contracts::{
        BodyIndexMap, ColorFormat, ColorResolution, ConfigVersion, DepthMode, DeviceConfig,
        JointId, StreamBlueprint,
    };

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = ConfigVersion::V1;
    }

    #[test]
    fn test_default_blueprint_is_valid() {
        let blueprint = StreamBlueprint::default();
        config_loader::ConfigLoader::validate(&blueprint).unwrap();
        assert_eq!(blueprint.device.depth_mode.dimensions(), Some((640, 576)));
    }

    #[test]
    fn test_blueprint_roundtrips_through_both_formats() {
        let blueprint = StreamBlueprint {
            device: DeviceConfig {
                color_format: ColorFormat::Nv12,
                color_resolution: ColorResolution::R720p,
                depth_mode: DepthMode::WfovBinned2x2,
                ..Default::default()
            },
            ..Default::default()
        };

        let toml = config_loader::ConfigLoader::to_toml(&blueprint).unwrap();
        let json = config_loader::ConfigLoader::to_json(&blueprint).unwrap();
        let from_toml = config_loader::ConfigLoader::load_from_str(
            &toml,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        let from_json = config_loader::ConfigLoader::load_from_str(
            &json,
            config_loader::ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(from_toml.device, blueprint.device);
        assert_eq!(from_json.device, blueprint.device);
    }

    #[test]
    fn test_joint_table_is_frozen() {
        assert_eq!(JointId::COUNT, 32);
        assert_eq!(JointId::Pelvis.index(), 0);
        assert_eq!(JointId::Nose.index(), 27);
        assert_eq!(JointId::bones().count(), 31);
    }

    #[test]
    fn test_body_index_background_marker() {
        let map = BodyIndexMap::new(2, 1, bytes_of(&[255, 0]));
        assert!(map.is_background(0));
        assert_eq!(map.body_at(1), Some(0));
        assert_eq!(map.foreground_count(), 1);
    }

    fn bytes_of(data: &[u8]) -> bytes::Bytes {
        bytes::Bytes::copy_from_slice(data)
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use acquisition::{compose_foreground, AssemblerConfig};
    use config_loader::ConfigLoader;
    use contracts::{
        ColorFormat, ColorResolution, DepthMode, DeviceConfig, Frame, JointId, Vector2,
    };
    use coordinate_mapper::CoordinateMapper;
    use device_session::{
        wait_for_frame, DeviceSession, MockConfig, MockDeviceDriver, MockTrackerEngine,
        SessionState, PERSON_MM,
    };
    use frame_store::FrameConsumer;
    use observability::StreamStatsAggregator;

    type MockSession = DeviceSession<MockDeviceDriver, MockTrackerEngine>;

    fn small_device() -> DeviceConfig {
        DeviceConfig {
            color_format: ColorFormat::Bgra32,
            color_resolution: ColorResolution::R720p,
            depth_mode: DepthMode::NfovBinned2x2,
            ..Default::default()
        }
    }

    fn mock_session(config: MockConfig) -> MockSession {
        DeviceSession::new(
            MockDeviceDriver::with_config(config.clone()),
            MockTrackerEngine::with_config(config),
        )
    }

    /// 轮询直到拿到满足条件的新帧
    fn next_frame_where(
        consumer: &mut FrameConsumer,
        mut accept: impl FnMut(&Frame) -> bool,
    ) -> Arc<Frame> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            assert!(Instant::now() < deadline, "no matching frame within 10s");
            match consumer.take_if_new() {
                Some(frame) if accept(&frame) => return frame,
                _ => std::thread::sleep(Duration::from_millis(2)),
            }
        }
    }

    /// End-to-end test: config file -> ConfigLoader -> DeviceSession -> consumer
    #[test]
    fn test_e2e_config_file_to_frames() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
            [device]
            camera_fps = "fps30"
            color_format = "bgra32"
            color_resolution = "r720p"
            depth_mode = "nfov_binned2x2"

            [acquisition]
            capture_timeout_ms = 500

            [mock]
            body_count = 2
            tracker_latency_frames = 1
            "#,
        )
        .unwrap();

        let blueprint = ConfigLoader::load_from_path(file.path()).unwrap();
        let mock = MockConfig::from(&blueprint.mock);
        let mut session = mock_session(mock)
            .with_assembler_config(AssemblerConfig::from(&blueprint.acquisition));

        session.start(&blueprint.device).unwrap();
        assert_eq!(session.state(), SessionState::Running);
        let mut consumer = session.subscribe();
        let frame = next_frame_where(&mut consumer, |f| f.bodies.len() == 2);
        session.stop();

        assert_eq!((frame.depth.width, frame.depth.height), (320, 288));
        let color = frame.color.as_ref().unwrap();
        assert_eq!((color.width, color.height), (1280, 720));
        let ids: Vec<u32> = frame.bodies.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_joints_map_into_both_images() {
        let mut session = mock_session(MockConfig {
            tracker_latency_frames: 1,
            ..Default::default()
        });
        session.start(&small_device()).unwrap();
        let mut consumer = session.subscribe();
        let frame = next_frame_where(&mut consumer, |f| {
            f.has_bodies() && f.depth_in_color.is_some()
        });
        let calibration = session.calibration().unwrap();
        session.stop();

        let mut mapper = CoordinateMapper::new(calibration);
        mapper.load_frame(&frame);

        let pelvis = frame.bodies[0].joint(JointId::Pelvis).position;
        assert!((pelvis.z - PERSON_MM as f32 / 1000.0).abs() < 0.01);

        // 深度图中骨盆落在人身上
        let in_depth = mapper.world_to_depth(pelvis).unwrap();
        let depth_mm = frame
            .depth
            .depth_at(in_depth.x.round() as u32, in_depth.y.round() as u32);
        assert_eq!(depth_mm, PERSON_MM);

        let in_color = mapper.world_to_color(pelvis).unwrap();
        assert!(in_color.x >= 0.0 && in_color.x < 1280.0);
        assert!(in_color.y >= 0.0 && in_color.y < 720.0);

        // 彩色像素 -> 世界坐标应回到骨盆附近
        let back = mapper.color_to_world(in_color);
        assert!(!back.is_zero());
        assert!((back.x - pelvis.x).abs() < 0.05, "{back:?} vs {pelvis:?}");
        assert!((back.y - pelvis.y).abs() < 0.05, "{back:?} vs {pelvis:?}");
        assert!((back.z - pelvis.z).abs() < 0.05, "{back:?} vs {pelvis:?}");

        // 彩色 <-> 深度像素互映射一致
        let via_color = mapper.color_to_depth(in_color).unwrap();
        assert!((via_color.x - in_depth.x).abs() < 2.0);
        assert!((via_color.y - in_depth.y).abs() < 2.0);
    }

    #[test]
    fn test_color_pixel_without_depth_maps_to_zero() {
        let mut session = mock_session(MockConfig::default());
        session.start(&small_device()).unwrap();
        let mut consumer = session.subscribe();
        let frame = next_frame_where(&mut consumer, |f| f.depth_in_color.is_some());
        let mut mapper = CoordinateMapper::new(session.calibration().unwrap());
        session.stop();

        // 未加载帧之前没有深度缓存
        assert!(mapper.color_to_world(Vector2::new(640.0, 360.0)).is_zero());
        mapper.load_frame(&frame);
        assert!(mapper.color_to_world(Vector2::new(-50.0, 10.0)).is_zero());
    }

    #[test]
    fn test_background_removal() {
        let mut session = mock_session(MockConfig {
            tracker_latency_frames: 1,
            ..Default::default()
        })
        .with_assembler_config(AssemblerConfig {
            align_color_to_depth: true,
            ..Default::default()
        });
        session.start(&small_device()).unwrap();
        let mut consumer = session.subscribe();
        let frame = next_frame_where(&mut consumer, |f| {
            f.body_index.is_some() && f.color_in_depth.is_some()
        });
        session.stop();

        let body_index = frame.body_index.as_ref().unwrap();
        let color_in_depth = frame.color_in_depth.as_ref().unwrap();
        assert_eq!(
            (color_in_depth.width, color_in_depth.height),
            (frame.depth.width, frame.depth.height)
        );

        let foreground = compose_foreground(color_in_depth, body_index).unwrap();
        let mut opaque = 0;
        for (i, pixel) in foreground.data.chunks_exact(4).enumerate() {
            if body_index.is_background(i) {
                assert_eq!(pixel, [0, 0, 0, 0]);
            } else if pixel[3] == 255 {
                opaque += 1;
            }
        }
        assert!(opaque > 0);
        assert!(opaque <= body_index.foreground_count());
    }

    #[test]
    fn test_consumers_are_independent() {
        let mut session = mock_session(MockConfig::default());
        session.start(&small_device()).unwrap();
        let mut first = session.subscribe();
        let mut second = session.subscribe();

        let a = next_frame_where(&mut first, |_| true);
        // 第一个消费者取走帧不影响第二个
        let b = next_frame_where(&mut second, |f| f.timestamp >= a.timestamp);
        session.stop();

        assert!(b.timestamp >= a.timestamp);
        assert_eq!(first.last_seen(), Some(a.timestamp));
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut session = mock_session(MockConfig::default());
        session.start(&small_device()).unwrap();
        let mut consumer = session.subscribe();

        let mut previous = None;
        for _ in 0..10 {
            let frame = next_frame_where(&mut consumer, |_| true);
            if let Some(prev) = previous {
                assert!(frame.timestamp > prev);
            }
            previous = Some(frame.timestamp);
        }
        session.stop();
    }

    #[test]
    fn test_restart_resets_store_and_keeps_consumers() {
        let mut session = mock_session(MockConfig::default());
        let mut consumer = session.subscribe();

        session.start(&small_device()).unwrap();
        next_frame_where(&mut consumer, |_| true);
        let first_published = session.metrics().frames_published;
        session.stop();
        assert!(first_published > 0);
        assert!(session.store().latest().is_some());

        session.start(&small_device()).unwrap();
        // 设备时钟从头开始，旧的消费者句柄仍能收到新帧
        let frame = next_frame_where(&mut consumer, |_| true);
        session.stop();
        assert!(frame.timestamp > Duration::ZERO);
        assert_eq!(session.driver().open_count(), 0);
    }

    #[test]
    fn test_every_color_format_decodes() {
        for format in [
            ColorFormat::Bgra32,
            ColorFormat::Mjpg,
            ColorFormat::Nv12,
            ColorFormat::Yuy2,
        ] {
            let mut session = mock_session(MockConfig::default());
            session
                .start(&DeviceConfig {
                    color_format: format,
                    ..small_device()
                })
                .unwrap();
            let mut consumer = session.subscribe();
            let frame = next_frame_where(&mut consumer, |f| f.color.is_some());
            session.stop();

            let color = frame.color.as_ref().unwrap();
            assert_eq!((color.width, color.height), (1280, 720), "{format:?}");
            assert_eq!(color.data.len(), 1280 * 720 * 4, "{format:?}");
            assert_eq!(color.pixel(0, 0).unwrap()[3], 255, "{format:?}");
        }
    }

    #[test]
    fn test_depth_only_session() {
        let mut session = mock_session(MockConfig::default());
        session
            .start(&DeviceConfig {
                color_resolution: ColorResolution::Off,
                synchronized_images_only: false,
                ..small_device()
            })
            .unwrap();
        let mut consumer = session.subscribe();
        let frame = next_frame_where(&mut consumer, |_| true);
        session.stop();

        assert!(frame.color.is_none());
        assert!(frame.depth_in_color.is_none());
        assert_eq!(frame.depth.pixel_count(), 320 * 288);
    }

    #[tokio::test]
    async fn test_async_consumer_aggregates_stream_stats() {
        let mut session = mock_session(MockConfig {
            tracker_latency_frames: 0,
            ..Default::default()
        });
        session.start(&small_device()).unwrap();
        let mut consumer = session.subscribe();
        let mut stats = StreamStatsAggregator::new();

        for _ in 0..5 {
            let frame = wait_for_frame(
                &mut consumer,
                Duration::from_millis(5),
                Duration::from_secs(5),
            )
            .await
            .expect("frame within 5s");
            stats.update(&frame);
        }
        session.stop();

        assert_eq!(stats.total_frames, 5);
        assert_eq!(stats.interval_stats.count(), 4);
        assert!(stats.interval_stats.min() > 0.0);
        assert_eq!(stats.frames_with_imu, 5);
    }
}
