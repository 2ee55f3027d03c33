use embassy_stm32::exti::ExtiInput;
use fan_core::edge::EdgeTimer;

use super::now_us;

/// Timestamps every tachometer transition of one fan.
#[embassy_executor::task(pool_size = 2)]
pub async fn run(mut tach: ExtiInput<'static>, timer: &'static EdgeTimer) -> ! {
    loop {
        tach.wait_for_any_edge().await;
        timer.record(now_us());
    }
}
