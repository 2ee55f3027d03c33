//! Board peripherals wrapped behind the controller's hardware traits.

use embassy_stm32::adc::{Adc, AnyAdcChannel, Resolution};
use embassy_stm32::gpio::Input;
use embassy_stm32::peripherals::{ADC1, TIM3};
use embassy_stm32::timer::Channel;
use embassy_stm32::timer::simple_pwm::SimplePwm;
use fan_core::channel::FanId;
use fan_core::machine::{BUTTON_COUNT, FanDriver};

mod eeprom;

pub use eeprom::I2cEeprom;

/// PWM carrier frequency expected by 4-wire fans.
pub const FAN_PWM_HZ: u32 = 25_000;

/// Two PWM channels of TIM3, one per fan.
pub struct PwmFanDriver {
    pwm: SimplePwm<'static, TIM3>,
}

impl PwmFanDriver {
    pub fn new(mut pwm: SimplePwm<'static, TIM3>) -> Self {
        for channel in [Channel::Ch1, Channel::Ch2] {
            pwm.channel(channel).set_duty_cycle(0);
            pwm.channel(channel).enable();
        }
        Self { pwm }
    }

    const fn timer_channel(fan: FanId) -> Channel {
        match fan {
            FanId::Fan1 => Channel::Ch1,
            FanId::Fan2 => Channel::Ch2,
        }
    }
}

impl FanDriver for PwmFanDriver {
    fn apply(&mut self, fan: FanId, duty: u8) {
        let mut channel = self.pwm.channel(Self::timer_channel(fan));
        let max = u32::from(channel.max_duty_cycle());
        let compare = max * u32::from(duty) / u32::from(u8::MAX);
        channel.set_duty_cycle(u16::try_from(compare).unwrap_or(u16::MAX));
    }

    fn release_all(&mut self) {
        for fan in FanId::ALL {
            self.pwm.channel(Self::timer_channel(fan)).set_duty_cycle(0);
        }
    }
}

/// Both temperature sensor inputs on ADC1.
pub struct AdcSensors {
    adc: Adc<'static, ADC1>,
    channels: [AnyAdcChannel<ADC1>; 2],
}

impl AdcSensors {
    pub fn new(mut adc: Adc<'static, ADC1>, channels: [AnyAdcChannel<ADC1>; 2]) -> Self {
        adc.set_resolution(Resolution::BITS10);
        Self { adc, channels }
    }

    /// Raw 10-bit readings of both sensors.
    pub fn read(&mut self) -> [u16; 2] {
        let [first, second] = &mut self.channels;
        [
            self.adc.blocking_read(first),
            self.adc.blocking_read(second),
        ]
    }
}

/// Front-panel buttons, active low.
pub struct PanelButtons {
    inputs: [Input<'static>; BUTTON_COUNT],
}

impl PanelButtons {
    pub const fn new(inputs: [Input<'static>; BUTTON_COUNT]) -> Self {
        Self { inputs }
    }

    pub fn read(&self) -> [bool; BUTTON_COUNT] {
        let [a, b, c] = &self.inputs;
        [a.is_low(), b.is_low(), c.is_low()]
    }
}
