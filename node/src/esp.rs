use core::convert::TryInto;
use std::{thread, time::Duration};

use anyhow::{anyhow, Context};
use ds18b20::{Ds18b20, Resolution};
use embedded_svc::{
    http::{client::Client as HttpClient, Method, Status},
    io::{Read, Write},
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, AnyInputPin, AnyOutputPin, Input, InputOutput, Output, PinDriver, Pull},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    http::client::{Configuration as HttpClientConfiguration, EspHttpConnection},
    log::EspLogger,
    nvs::{EspDefaultNvsPartition, EspNvs},
    sntp::{EspSntp, SyncStatus},
    wifi::EspWifi,
};
use log::{info, warn};
use one_wire_bus::{Address, OneWire};

use roomnode_common::{
    config::{NetworkConfig, PinConfig},
    ActuationController, ControlLoop, HttpResponse, HttpTransport, MotionInput, NetworkLink,
    OutputError, Outputs, RuntimeConfig, Scheduler, SensorReader, SettingsFetcher, SystemClock,
    TelemetryReporter, TemperatureProbe, TransportError, DEVICE_DISCONNECTED_C,
};

const NVS_NAMESPACE: &str = "roomnode";
const NVS_RUNTIME_KEY: &str = "runtime_json";

const MAX_HTTP_BODY: usize = 4096;
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);
const WATCHDOG_FEED_SLICE: Duration = Duration::from_secs(1);
const SNTP_POLL_MS: u64 = 100;

struct OneWireProbe {
    one_wire: OneWire<PinDriver<'static, AnyIOPin, InputOutput>>,
    address: Option<Address>,
    delay: Ets,
    gpio: i32,
    converting: bool,
}

impl OneWireProbe {
    fn new(gpio: i32) -> anyhow::Result<Self> {
        let pin = unsafe { AnyIOPin::new(gpio) };
        let mut one_wire_pin = PinDriver::input_output_od(pin)?;
        one_wire_pin.set_pull(Pull::Up)?;
        one_wire_pin.set_high()?;

        let one_wire = OneWire::new(one_wire_pin)
            .map_err(|err| anyhow!("failed to initialize one-wire bus: {err:?}"))?;

        let mut probe = Self {
            one_wire,
            address: None,
            delay: Ets,
            gpio,
            converting: false,
        };
        probe.refresh_address();
        Ok(probe)
    }

    fn refresh_address(&mut self) {
        let mut first_ds18: Option<Address> = None;
        let mut device_count = 0_u32;

        for addr in self.one_wire.devices(false, &mut self.delay) {
            match addr {
                Ok(address) => {
                    device_count = device_count.saturating_add(1);
                    if first_ds18.is_none() && address.family_code() == ds18b20::FAMILY_CODE {
                        first_ds18 = Some(address);
                    }
                }
                Err(err) => {
                    warn!("one-wire device scan failed: {err:?}");
                    break;
                }
            }
        }

        self.address = first_ds18;
        if let Some(address) = self.address {
            info!(
                "DS18B20 ready on GPIO{} ({} one-wire device(s), using {:?})",
                self.gpio, device_count, address
            );
        } else {
            warn!(
                "no DS18B20 found on GPIO{} ({} one-wire device(s) detected)",
                self.gpio, device_count
            );
        }
    }
}

impl TemperatureProbe for OneWireProbe {
    fn request_conversion(&mut self) {
        if self.address.is_none() {
            self.refresh_address();
        }
        if self.address.is_none() {
            self.converting = false;
            return;
        }

        match ds18b20::start_simultaneous_temp_measurement(&mut self.one_wire, &mut self.delay) {
            Ok(()) => {
                // Blocks for the full 12-bit conversion, as the bus library does
                // before the caller's settling delay starts.
                Resolution::Bits12.delay_for_measurement_time(&mut self.delay);
                self.converting = true;
            }
            Err(err) => {
                warn!("failed to start DS18B20 conversion: {err:?}");
                self.address = None;
                self.converting = false;
            }
        }
    }

    fn read_celsius(&mut self) -> f32 {
        let Some(address) = self.address.filter(|_| self.converting) else {
            return DEVICE_DISCONNECTED_C;
        };
        self.converting = false;

        let sensor = match Ds18b20::new::<core::convert::Infallible>(address) {
            Ok(sensor) => sensor,
            Err(err) => {
                warn!("invalid DS18B20 address {:?}: {err:?}", address);
                self.address = None;
                return DEVICE_DISCONNECTED_C;
            }
        };

        match sensor.read_data(&mut self.one_wire, &mut self.delay) {
            Ok(data) => data.temperature,
            Err(err) => {
                warn!("failed to read DS18B20 data: {err:?}");
                self.address = None;
                DEVICE_DISCONNECTED_C
            }
        }
    }
}

struct PirInput {
    pin: PinDriver<'static, AnyInputPin, Input>,
}

impl MotionInput for PirInput {
    fn is_motion(&mut self) -> bool {
        self.pin.is_high()
    }
}

struct GpioOutputs {
    indicator: PinDriver<'static, AnyOutputPin, Output>,
    fan: PinDriver<'static, AnyOutputPin, Output>,
    light: PinDriver<'static, AnyOutputPin, Output>,
}

impl GpioOutputs {
    fn new(pins: &PinConfig) -> anyhow::Result<Self> {
        let mut outputs = Self {
            indicator: output_pin(pins.indicator_pin)?,
            fan: output_pin(pins.fan_pin)?,
            light: output_pin(pins.light_pin)?,
        };
        outputs.indicator.set_low()?;
        Ok(outputs)
    }
}

fn output_pin(gpio: i32) -> anyhow::Result<PinDriver<'static, AnyOutputPin, Output>> {
    let pin = unsafe { AnyOutputPin::new(gpio) };
    PinDriver::output(pin).with_context(|| format!("GPIO{gpio} unavailable as output"))
}

fn drive(
    name: &'static str,
    pin: &mut PinDriver<'static, AnyOutputPin, Output>,
    on: bool,
) -> Result<(), OutputError> {
    pin.set_level(on.into())
        .map_err(|err| OutputError::new(name, err.to_string()))
}

impl Outputs for GpioOutputs {
    fn set_fan(&mut self, on: bool) -> Result<(), OutputError> {
        drive("fan", &mut self.fan, on)
    }

    fn set_light(&mut self, on: bool) -> Result<(), OutputError> {
        drive("light", &mut self.light, on)
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), OutputError> {
        drive("indicator", &mut self.indicator, on)
    }
}

/// Opens a fresh connection per request; nothing is kept between ticks.
struct EspHttpTransport {
    timeout: Duration,
}

impl EspHttpTransport {
    fn client(&self) -> Result<HttpClient<EspHttpConnection>, TransportError> {
        let conf = HttpClientConfiguration {
            timeout: Some(self.timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        EspHttpConnection::new(&conf)
            .map(HttpClient::wrap)
            .map_err(|err| TransportError::Request(format!("{err:?}")))
    }
}

fn read_response_body<R: Read>(response: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    let mut chunk = [0_u8; 512];
    loop {
        let read = response
            .read(&mut chunk)
            .map_err(|err| TransportError::Request(format!("{err:?}")))?;
        if read == 0 {
            break;
        }
        if body.len() + read > MAX_HTTP_BODY {
            return Err(TransportError::Request("response body too large".to_string()));
        }
        body.extend_from_slice(&chunk[..read]);
    }
    Ok(body)
}

impl HttpTransport for EspHttpTransport {
    fn post(
        &mut self,
        url: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        let mut client = self.client()?;
        let content_length = body.len().to_string();
        let headers = [
            ("Content-Type", content_type),
            ("Content-Length", content_length.as_str()),
        ];

        let mut request = client
            .request(Method::Post, url, &headers)
            .map_err(|err| TransportError::Request(format!("{err:?}")))?;
        request
            .write_all(body)
            .map_err(|err| TransportError::Request(format!("{err:?}")))?;
        request
            .flush()
            .map_err(|err| TransportError::Request(format!("{err:?}")))?;

        let mut response = request
            .submit()
            .map_err(|err| TransportError::Request(format!("{err:?}")))?;
        let status = i32::from(response.status());
        let body = read_response_body(&mut response)?;
        Ok(HttpResponse { status, body })
    }

    fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError> {
        let mut client = self.client()?;
        let request = client
            .request(Method::Get, url, &[])
            .map_err(|err| TransportError::Request(format!("{err:?}")))?;
        let mut response = request
            .submit()
            .map_err(|err| TransportError::Request(format!("{err:?}")))?;
        let status = i32::from(response.status());
        let body = read_response_body(&mut response)?;
        Ok(HttpResponse { status, body })
    }
}

struct WifiLink {
    wifi: EspWifi<'static>,
}

impl NetworkLink for WifiLink {
    fn is_connected(&mut self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }

    fn local_address(&mut self) -> Option<String> {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip.to_string())
    }
}

/// Sleeps in short slices so the task watchdog keeps being fed.
struct WatchdogScheduler {
    watchdog: TaskWatchdog,
}

impl Scheduler for WatchdogScheduler {
    fn sleep(&mut self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() {
            self.watchdog.feed();
            let slice = remaining.min(WATCHDOG_FEED_SLICE);
            thread::sleep(slice);
            remaining -= slice;
        }
        self.watchdog.feed();
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let stored = load_runtime_config(&nvs_partition).unwrap_or_else(|err| {
        warn!("failed to load runtime config from NVS: {err:#}");
        None
    });
    let has_stored = stored.is_some();
    let mut runtime = stored.unwrap_or_default();
    apply_build_defaults(&mut runtime.network, has_stored);
    runtime.sanitize();

    let Peripherals { modem, .. } = Peripherals::take()?;

    let outputs = GpioOutputs::new(&runtime.pins).context("failed to initialize outputs")?;
    let probe = OneWireProbe::new(runtime.pins.temp_pin)
        .context("failed to initialize temperature probe")?;
    let motion = PirInput {
        pin: PinDriver::input(unsafe { AnyInputPin::new(runtime.pins.motion_pin) })
            .context("failed to initialize motion input")?,
    };

    let wifi = start_wifi(modem, sys_loop, nvs_partition, &runtime.network)
        .context("wifi startup failed")?;

    let watchdog = TaskWatchdog::subscribe_current_task(WATCHDOG_TIMEOUT)?;

    let reader = SensorReader::new(
        probe,
        motion,
        SystemClock::from_name(&runtime.timezone),
        runtime.control.settle_delay(),
    );
    let timeout = runtime.network.http_timeout();
    let mut control = ControlLoop::new(
        runtime.control.clone(),
        reader,
        TelemetryReporter::new(EspHttpTransport { timeout }, runtime.network.telemetry_url),
        SettingsFetcher::new(EspHttpTransport { timeout }, runtime.network.settings_url),
        ActuationController::new(runtime.actuation),
        outputs,
        WifiLink { wifi },
        WatchdogScheduler { watchdog },
    );

    control.connect();

    let sntp = EspSntp::new_default().context("failed to start SNTP")?;
    info!("waiting for SNTP time synchronization");
    while sntp.get_sync_status() != SyncStatus::Completed {
        WatchdogScheduler { watchdog }.sleep(Duration::from_millis(SNTP_POLL_MS));
    }
    info!("time synchronized");

    control.run()
}

fn load_runtime_config(
    partition: &EspDefaultNvsPartition,
) -> anyhow::Result<Option<RuntimeConfig>> {
    let nvs = EspNvs::new(partition.clone(), NVS_NAMESPACE, true)?;
    let mut buffer = vec![0_u8; 4096];
    match nvs.get_str(NVS_RUNTIME_KEY, &mut buffer)? {
        Some(value) => Ok(Some(serde_json::from_str::<RuntimeConfig>(value)?)),
        None => Ok(None),
    }
}

/// Build-time endpoints only stand in for a config that was never stored.
fn apply_build_defaults(network: &mut NetworkConfig, has_stored: bool) {
    if network.wifi_ssid.is_empty() {
        network.wifi_ssid = option_env!("WIFI_SSID").unwrap_or("CHANGE_ME").to_string();
    }
    if network.wifi_pass.is_empty() {
        network.wifi_pass = option_env!("WIFI_PASS").unwrap_or_default().to_string();
    }
    if !has_stored {
        network.override_endpoints(option_env!("TELEMETRY_URL"), option_env!("SETTINGS_URL"));
    }
}

/// Starts association without waiting; the control loop blinks until the
/// link comes up.
fn start_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<EspWifi<'static>> {
    let mut wifi = EspWifi::new(modem, sys_loop, Some(nvs_partition))?;

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    wifi.connect()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);
    Ok(wifi)
}

/// Subscription of the control task to the ESP-IDF task watchdog.
#[derive(Clone, Copy)]
struct TaskWatchdog;

impl TaskWatchdog {
    /// `ESP_ERR_INVALID_STATE` means the watchdog is already configured or the
    /// task already subscribed; both leave it armed.
    fn subscribe_current_task(timeout: Duration) -> anyhow::Result<Self> {
        let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let config = esp_idf_svc::sys::esp_task_wdt_config_t {
            timeout_ms,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        armed(
            "esp_task_wdt_init",
            unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) },
        )?;
        armed(
            "esp_task_wdt_add",
            unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) },
        )?;
        info!("task watchdog armed ({} ms)", timeout_ms);
        Ok(Self)
    }

    fn feed(self) {
        // Only fails for tasks that never subscribed.
        unsafe {
            esp_idf_svc::sys::esp_task_wdt_reset();
        }
    }
}

fn armed(call: &str, rc: esp_idf_svc::sys::esp_err_t) -> anyhow::Result<()> {
    match rc {
        esp_idf_svc::sys::ESP_OK | esp_idf_svc::sys::ESP_ERR_INVALID_STATE => Ok(()),
        code => Err(anyhow!("{call} returned {code}")),
    }
}
