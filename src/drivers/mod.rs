// BreatheRight — ESP-IDF peripheral drivers
//
// Each driver implements one of the `ports` traits so the task loops stay
// hardware independent.

pub mod microphone;
pub mod mpu6886;
pub mod pms_uart;
pub mod shadow_mqtt;
pub mod sk6812;
