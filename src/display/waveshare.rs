use std::thread;
use std::time::Duration;

use rppal::{gpio, spi};

use super::Display;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] gpio::Error),
    #[error("SPI error: {0}")]
    Spi(#[from] spi::Error),
}

/// Waveshare 3.7" e-paper panel on the Raspberry Pi SPI bus.
pub struct EPaper3_7in {
    hardware: Box<dyn HardwareInterface>,
}

impl EPaper3_7in {
    const PIN_DC: u8 = 25; // Data/command pin (high = data, low = command)
    const PIN_RST: u8 = 17; // External reset pin (low = reset)
    const PIN_BUSY: u8 = 24; // Busy output pin (low = busy)

    pub const WIDTH: usize = 280;
    pub const HEIGHT: usize = 480;

    pub fn new() -> Result<Self, DeviceError> {
        let gpio = gpio::Gpio::new()?;

        Ok(Self {
            hardware: Box::new(RaspberryPiInterface {
                spi: spi::Spi::new(
                    spi::Bus::Spi0,
                    spi::SlaveSelect::Ss0,
                    10_000_000, // 10 MHz = 100 ns
                    spi::Mode::Mode0,
                )?,
                pin_dc: gpio.get(Self::PIN_DC)?.into_output(),
                pin_rst: gpio.get(Self::PIN_RST)?.into_output(),
                pin_busy: gpio.get(Self::PIN_BUSY)?.into_input(),
            }),
        })
    }

    #[cfg(test)]
    fn with_interface(hardware: Box<dyn HardwareInterface>) -> Self {
        Self { hardware }
    }

    fn reset(&mut self) {
        self.hardware
            .set_level(GpioOutputPin::Reset, gpio::Level::High);
        thread::sleep(Duration::from_millis(30));
        self.hardware
            .set_level(GpioOutputPin::Reset, gpio::Level::Low);
        thread::sleep(Duration::from_millis(3));
        self.hardware
            .set_level(GpioOutputPin::Reset, gpio::Level::High);
        thread::sleep(Duration::from_millis(30));
    }

    fn wait_for_busy(&mut self) {
        if self.hardware.get_level(GpioInputPin::Busy) == gpio::Level::High {
            log::debug!("Waiting for device...");
            while self.hardware.get_level(GpioInputPin::Busy) == gpio::Level::High {
                thread::sleep(Duration::from_millis(200));
            }
        }
    }

    fn send(&mut self, command: u8, data: &[u8]) -> Result<(), DeviceError> {
        self.send_command(command)?;
        if !data.is_empty() {
            self.send_data(data)?;
        }

        Ok(())
    }

    fn send_command(&mut self, command: u8) -> Result<(), DeviceError> {
        self.hardware
            .set_level(GpioOutputPin::DataCommand, gpio::Level::Low);
        self.hardware.write_to_spi(&[command])?;

        Ok(())
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        self.hardware
            .set_level(GpioOutputPin::DataCommand, gpio::Level::High);
        for chunk in data.chunks(4096) {
            self.hardware.write_to_spi(chunk)?;
        }

        Ok(())
    }

    fn push_frame(&mut self, plane1: &[u8], plane2: &[u8]) -> Result<(), DeviceError> {
        self.send(0x4E, &[0x00, 0x00])?;
        self.send(0x4F, &[0x00, 0x00])?;

        self.send(0x24, plane1)?;
        self.send(0x26, plane2)?;

        self.load_look_up_table()?;
        self.send(0x22, &[0xC7])?;
        self.send(0x20, &[])?;
        self.wait_for_busy();

        Ok(())
    }

    fn load_look_up_table(&mut self) -> Result<(), DeviceError> {
        self.send(
            0x32,
            &[
                0x2A, 0x06, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //1
                0x28, 0x06, 0x14, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //2
                0x20, 0x06, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //3
                0x14, 0x06, 0x28, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //4
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //5
                0x00, 0x02, 0x02, 0x0A, 0x00, 0x00, 0x00, 0x08, 0x08, 0x02, //6
                0x00, 0x02, 0x02, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //7
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //8
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //9
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //10
                0x22, 0x22, 0x22, 0x22, 0x22,
            ],
        )
    }
}

impl Display for EPaper3_7in {
    type Err = DeviceError;

    fn on(&mut self) -> Result<(), DeviceError> {
        self.reset();

        self.send(0x12, &[])?;
        thread::sleep(Duration::from_millis(300));

        self.send(0x46, &[0xF7])?;
        self.wait_for_busy();
        self.send(0x47, &[0xF7])?;
        self.wait_for_busy();

        // setting gate number
        self.send(0x01, &[0xDF, 0x01, 0x00])?;

        // set gate voltage
        self.send(0x03, &[0x00])?;

        // set source voltage
        self.send(0x04, &[0x41, 0xA8, 0x32])?;

        // set data entry sequence
        self.send(0x11, &[0x03])?;

        // set border
        self.send(0x3C, &[0x00])?;

        // set booster strength
        self.send(0x0C, &[0xAE, 0xC7, 0xC3, 0xC0, 0xC0])?;

        // set internal sensor on
        self.send(0x18, &[0x80])?;

        // set vcom value
        self.send(0x2C, &[0x44])?;

        // set display option, these setting turn on previous function
        self.send(
            0x37,
            &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        )?;

        // setting X direction start/end position of RAM
        self.send(0x44, &[0x00, 0x00, 0x17, 0x01])?;

        // setting Y direction start/end position of RAM
        self.send(0x45, &[0x00, 0x00, 0xDF, 0x01])?;

        // Display Update Control 2
        self.send(0x22, &[0xCF])
    }

    fn off(&mut self) -> Result<(), DeviceError> {
        self.send(0x49, &[0x00])?;
        let blank = [0xFF].repeat(Self::WIDTH / 8 * Self::HEIGHT);
        self.push_frame(&blank, &blank)?;

        self.sleep()
    }

    fn sleep(&mut self) -> Result<(), DeviceError> {
        self.send(0x50, &[0xF7])?;
        self.send(0x02, &[])?;
        self.send(0x07, &[0xA5])?;

        self.hardware
            .set_level(GpioOutputPin::DataCommand, gpio::Level::Low);
        self.hardware
            .set_level(GpioOutputPin::Reset, gpio::Level::Low);

        Ok(())
    }

    /// Pack the 2-bit gray levels into the panel's two 1-bit planes and push
    /// them, MSB first within each byte.
    fn draw(&mut self, image: impl IntoIterator<Item = u8>) -> Result<(), DeviceError> {
        let capacity = Self::WIDTH / 8 * Self::HEIGHT;
        let mut plane1 = Vec::with_capacity(capacity);
        let mut plane2 = Vec::with_capacity(capacity);

        let (mut bits1, mut bits2, mut count) = (0u8, 0u8, 0);
        for value in image {
            bits1 = bits1 << 1 | (value & 0b01);
            bits2 = bits2 << 1 | (value >> 1 & 0b01);
            count += 1;

            if count == 8 {
                plane1.push(bits1);
                plane2.push(bits2);
                bits1 = 0;
                bits2 = 0;
                count = 0;
            }
        }

        self.push_frame(&plane1, &plane2)
    }

    fn get_dimensions(&self) -> (usize, usize) {
        (Self::WIDTH, Self::HEIGHT)
    }

    fn get_color_depth(&self) -> u8 {
        4
    }
}

struct RaspberryPiInterface {
    spi: spi::Spi,
    pin_dc: gpio::OutputPin,
    pin_rst: gpio::OutputPin,
    pin_busy: gpio::InputPin,
}

impl HardwareInterface for RaspberryPiInterface {
    fn set_level(&mut self, pin: GpioOutputPin, level: gpio::Level) {
        match pin {
            GpioOutputPin::Reset => &mut self.pin_rst,
            GpioOutputPin::DataCommand => &mut self.pin_dc,
        }
        .write(level)
    }

    fn get_level(&self, pin: GpioInputPin) -> gpio::Level {
        match pin {
            GpioInputPin::Busy => &self.pin_busy,
        }
        .read()
    }

    fn write_to_spi(&mut self, buffer: &[u8]) -> Result<usize, spi::Error> {
        self.spi.write(buffer)
    }
}

trait HardwareInterface {
    fn set_level(&mut self, pin: GpioOutputPin, level: gpio::Level);

    fn get_level(&self, pin: GpioInputPin) -> gpio::Level;

    fn write_to_spi(&mut self, data: &[u8]) -> Result<usize, spi::Error>;
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum GpioOutputPin {
    Reset,
    DataCommand,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum GpioInputPin {
    Busy,
}
