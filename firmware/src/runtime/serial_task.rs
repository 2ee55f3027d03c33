use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;

use crate::serial::{SERIAL_PIPE_CAPACITY, SerialLink};

const SERIAL_BAUD: u32 = 9_600;
const UART_CHUNK: usize = 32;

static UART_BUFFERS: StaticCell<UartBuffers> = StaticCell::new();

struct UartBuffers {
    tx: [u8; SERIAL_PIPE_CAPACITY],
    rx: [u8; SERIAL_PIPE_CAPACITY],
}

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    link: &'static SerialLink,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = SERIAL_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let buffers = UART_BUFFERS.init(UartBuffers {
        tx: [0; SERIAL_PIPE_CAPACITY],
        rx: [0; SERIAL_PIPE_CAPACITY],
    });
    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        &mut buffers.tx,
        &mut buffers.rx,
        UartIrqs,
        config,
    )
    .expect("failed to initialize serial UART");

    let (mut uart_tx, mut uart_rx) = uart.split();

    let outbound = async move {
        let mut chunk = [0u8; UART_CHUNK];
        loop {
            let count = link.tx.read(&mut chunk).await;
            if uart_tx.write_all(&chunk[..count]).await.is_err() {
                defmt::warn!("serial: UART write error, dropped {=usize} bytes", count);
                Timer::after(Duration::from_millis(5)).await;
                continue;
            }
            if uart_tx.flush().await.is_err() {
                defmt::warn!("serial: UART flush error");
            }
        }
    };

    let inbound = async move {
        let mut chunk = [0u8; UART_CHUNK];
        loop {
            match uart_rx.read(&mut chunk).await {
                Ok(count) if count > 0 => link.rx.write_all(&chunk[..count]).await,
                Ok(_) => {}
                Err(_) => {
                    defmt::warn!("serial: UART read error");
                    Timer::after(Duration::from_millis(5)).await;
                }
            }
        }
    };

    join(outbound, inbound).await;
    loop {
        core::future::pending::<()>().await;
    }
}
