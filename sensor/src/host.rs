use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{debug, info, warn};

use aircon_common::{
    poll::{next_measurement_poll, next_observation_poll},
    unit_topic, ControllerConfig, Measurement, NetworkConfig, OutdoorObservation,
    SUFFIX_OUTDOOR_OBSERVATION, SUFFIX_SENSOR_MEASUREMENT,
};

/// Bounded random walk standing in for a real reading.
#[derive(Debug, Clone, Copy)]
struct Drift {
    value: f64,
    min: f64,
    max: f64,
    step: f64,
}

impl Drift {
    fn new(value: f64, min: f64, max: f64, step: f64) -> Self {
        Self {
            value,
            min,
            max,
            step,
        }
    }

    fn next(&mut self, rng: &mut impl Rng) -> f64 {
        let delta = rng.gen_range(-self.step..=self.step);
        self.value = (self.value + delta).clamp(self.min, self.max);
        (self.value * 10.0).round() / 10.0
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let network = NetworkConfig::default();
    let unit_id = std::env::var("AIRCON_UNIT_ID").unwrap_or(network.unit_id);
    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(network.mqtt_port);

    let mut mqtt_options =
        MqttOptions::new(format!("aircon-sensor-{unit_id}"), mqtt_host, mqtt_port);

    if let Ok(user) = std::env::var("MQTT_USER") {
        let pass = std::env::var("MQTT_PASS").unwrap_or_default();
        mqtt_options.set_credentials(user, pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!("sensor publisher started for unit {unit_id}");

    let outdoor = tokio::spawn(publish_observations(mqtt.clone(), unit_id.clone()));
    let indoor = publish_measurements(mqtt, unit_id);

    tokio::select! {
        result = indoor => result,
        result = outdoor => result.context("outdoor publisher task failed")?,
    }
}

/// Publishes a room reading just after each simulated vendor measurement.
async fn publish_measurements(mqtt: AsyncClient, unit_id: String) -> anyhow::Result<()> {
    let config = ControllerConfig::default();
    let interval_secs = config.measurement_interval_ms as f64 / 1000.0;
    let topic = unit_topic(&unit_id, SUFFIX_SENSOR_MEASUREMENT);

    let mut rng = StdRng::from_entropy();
    let mut temperature = Drift::new(22.0, 16.0, 30.0, 0.4);
    let mut humidity = Drift::new(50.0, 25.0, 80.0, 2.0);
    let measured_since = Instant::now();

    loop {
        let age = measured_since.elapsed().as_secs_f64() % interval_secs;
        let measurement = Measurement {
            seconds_ago: Some(age.floor()),
            ..Measurement::new(temperature.next(&mut rng), humidity.next(&mut rng))
        };

        let payload =
            serde_json::to_vec(&measurement).context("failed to serialize measurement")?;
        mqtt.publish(topic.as_str(), QoS::AtLeastOnce, true, payload)
            .await
            .context("failed to publish measurement")?;

        let delay = next_measurement_poll(&config, measurement.seconds_ago);
        debug!("published measurement ({measurement}); next in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}

/// Publishes an outdoor observation shortly after each half hour.
async fn publish_observations(mqtt: AsyncClient, unit_id: String) -> anyhow::Result<()> {
    let topic = unit_topic(&unit_id, SUFFIX_OUTDOOR_OBSERVATION);

    let mut rng = StdRng::from_entropy();
    let mut temperature = Drift::new(18.0, 0.0, 38.0, 1.5);
    let mut humidity = Drift::new(60.0, 15.0, 100.0, 6.0);

    loop {
        let observation =
            OutdoorObservation::new(temperature.next(&mut rng), humidity.next(&mut rng));

        let payload =
            serde_json::to_vec(&observation).context("failed to serialize observation")?;
        mqtt.publish(topic.as_str(), QoS::AtLeastOnce, true, payload)
            .await
            .context("failed to publish outdoor observation")?;

        let delay = next_observation_poll(Utc::now(), rng.gen::<f64>());
        debug!("published outdoor observation ({observation}); next in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}
