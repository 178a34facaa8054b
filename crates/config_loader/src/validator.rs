//! 配置校验模块
//!
//! 校验规则：
//! - 设备模式组合受硬件支持 (帧率/分辨率/格式)
//! - capture_timeout_ms > 0
//! - tick_hz > 0 且有限
//! - mock.body_count 不超过模拟场景能放下的人数

use contracts::{ContractError, MockSettings, StreamBlueprint};

/// 单次 capture 等待上限 (毫秒)
const MAX_CAPTURE_TIMEOUT_MS: u64 = 60_000;

/// 校验 StreamBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    validate_device(blueprint)?;
    validate_acquisition(blueprint)?;
    validate_consumer(blueprint)?;
    validate_mock(blueprint)?;
    Ok(())
}

/// 校验设备模式组合
fn validate_device(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    blueprint
        .device
        .validate()
        .map_err(|e| ContractError::config_validation("device", e.to_string()))
}

/// 校验生产者循环配置
fn validate_acquisition(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let acquisition = &blueprint.acquisition;

    if acquisition.capture_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "acquisition.capture_timeout_ms",
            "capture_timeout_ms must be > 0",
        ));
    }

    if acquisition.capture_timeout_ms > MAX_CAPTURE_TIMEOUT_MS {
        return Err(ContractError::config_validation(
            "acquisition.capture_timeout_ms",
            format!(
                "capture_timeout_ms must be <= {MAX_CAPTURE_TIMEOUT_MS}, got {}",
                acquisition.capture_timeout_ms
            ),
        ));
    }

    // 对齐到彩色网格需要彩色流
    if !blueprint.device.color_resolution.is_enabled()
        && (acquisition.align_depth_to_color || acquisition.align_color_to_depth)
    {
        return Err(ContractError::config_validation(
            "acquisition",
            "color alignment requested but color stream is off",
        ));
    }

    Ok(())
}

/// 校验消费端配置
fn validate_consumer(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let tick_hz = blueprint.consumer.tick_hz;
    if !tick_hz.is_finite() || tick_hz <= 0.0 {
        return Err(ContractError::config_validation(
            "consumer.tick_hz",
            format!("tick_hz must be > 0, got {tick_hz}"),
        ));
    }
    Ok(())
}

/// 校验 Mock 硬件配置
fn validate_mock(blueprint: &StreamBlueprint) -> Result<(), ContractError> {
    let max = MockSettings::MAX_BODY_COUNT;
    if blueprint.mock.body_count > max {
        return Err(ContractError::config_validation(
            "mock.body_count",
            format!(
                "body_count must be <= {max}, got {}",
                blueprint.mock.body_count
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ColorResolution, DepthMode};

    fn minimal_blueprint() -> StreamBlueprint {
        StreamBlueprint::default()
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_unsupported_mode_combination() {
        let mut bp = minimal_blueprint();
        bp.device.depth_mode = DepthMode::WfovUnbinned;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("'device'"), "got: {err}");
        assert!(err.contains("30 fps"), "got: {err}");
    }

    #[test]
    fn test_zero_capture_timeout() {
        let mut bp = minimal_blueprint();
        bp.acquisition.capture_timeout_ms = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("capture_timeout_ms must be > 0"), "got: {err}");
    }

    #[test]
    fn test_excessive_capture_timeout() {
        let mut bp = minimal_blueprint();
        bp.acquisition.capture_timeout_ms = MAX_CAPTURE_TIMEOUT_MS + 1;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_alignment_without_color() {
        let mut bp = minimal_blueprint();
        bp.device.color_resolution = ColorResolution::Off;
        bp.device.synchronized_images_only = false;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("color stream is off"), "got: {err}");

        bp.acquisition.align_depth_to_color = false;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_invalid_tick_rate() {
        let mut bp = minimal_blueprint();
        bp.consumer.tick_hz = 0.0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("tick_hz must be > 0"), "got: {err}");

        bp.consumer.tick_hz = f64::NAN;
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_body_count_limited_to_scene() {
        let mut bp = minimal_blueprint();
        bp.mock.body_count = MockSettings::MAX_BODY_COUNT;
        assert!(validate(&bp).is_ok());

        bp.mock.body_count = 10;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("body_count must be <= 6"), "got: {err}");
    }
}
