use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, OutputType, Pull};
use embassy_stm32::i2c::{Config as I2cConfig, I2c};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_time::Instant;
use fan_core::config::ConfigStore;
use fan_core::edge::EdgeTimer;
use fan_core::machine::{ControlStateMachine, MachineConfig};

use crate::hw::{AdcSensors, FAN_PWM_HZ, I2cEeprom, PanelButtons, PwmFanDriver};
use crate::serial::SerialLink;

mod control_task;
mod hall_task;
mod serial_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Tach outputs pulse twice per revolution and both edges are captured.
const EDGES_PER_TACH_PERIOD: u32 = 2;
const EEPROM_I2C_HZ: u32 = 100_000;

pub(super) static EDGE_TIMERS: [EdgeTimer; 2] = [
    EdgeTimer::new(EDGES_PER_TACH_PERIOD),
    EdgeTimer::new(EDGES_PER_TACH_PERIOD),
];
pub(super) static SERIAL: SerialLink = SerialLink::new();

/// Microsecond timestamp shared by the edge interrupts and the control tick.
#[allow(clippy::cast_possible_truncation)]
pub(super) fn now_us() -> u32 {
    Instant::now().as_micros() as u32
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        PA6,
        PA7,
        PA8,
        PA11,
        PA12,
        PB0,
        PB1,
        PB4,
        PB5,
        PB6,
        PB7,
        EXTI4,
        EXTI5,
        ADC1,
        I2C1,
        TIM3,
        USART5,
        ..
    } = hal::init(config);

    let pwm = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        Some(PwmPin::new(PA7, OutputType::PushPull)),
        None,
        None,
        Hertz(FAN_PWM_HZ),
        CountingMode::EdgeAlignedUp,
    );
    let driver = PwmFanDriver::new(pwm);

    let sensors = AdcSensors::new(Adc::new(ADC1), [PA0.degrade_adc(), PA1.degrade_adc()]);
    let buttons = PanelButtons::new([
        Input::new(PA8, Pull::Up),
        Input::new(PA11, Pull::Up),
        Input::new(PA12, Pull::Up),
    ]);

    let mut i2c_config = I2cConfig::default();
    i2c_config.frequency = Hertz(EEPROM_I2C_HZ);
    let eeprom = I2cEeprom::new(I2c::new_blocking(I2C1, PB6, PB7, i2c_config));
    let machine = ControlStateMachine::new(ConfigStore::new(eeprom), MachineConfig::default());

    spawner
        .spawn(hall_task::run(
            ExtiInput::new(PB4, EXTI4, Pull::Up),
            &EDGE_TIMERS[0],
        ))
        .expect("failed to spawn fan 1 tach task");
    spawner
        .spawn(hall_task::run(
            ExtiInput::new(PB5, EXTI5, Pull::Up),
            &EDGE_TIMERS[1],
        ))
        .expect("failed to spawn fan 2 tach task");

    spawner
        .spawn(serial_task::run(&SERIAL, USART5, PB0, PB1))
        .expect("failed to spawn serial task");

    spawner
        .spawn(control_task::run(
            machine,
            control_task::ControlIo {
                driver,
                sensors,
                buttons,
            },
        ))
        .expect("failed to spawn control task");

    core::future::pending::<()>().await;
}
