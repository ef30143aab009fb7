// BreatheRight — Device Shadow over MQTT
//
// Publishes reports to `$aws/things/<thing>/shadow/update` and listens on
// `.../update/delta` for a new `hqiStatus`. Connection events are drained
// on their own thread; the delta handler writes straight into the shared
// state.

use std::sync::Arc;

use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};

use crate::config::*;
use crate::ports::CloudSync;
use crate::shadow::{parse_delta, ShadowReport};
use crate::state::SharedState;

const STACK_MQTT_EVENTS: usize = 6144;

pub struct ShadowMqtt {
    client: EspMqttClient<'static>,
    update_topic: String,
    delta_topic: String,
    subscribed: bool,
}

impl ShadowMqtt {
    pub fn connect(state: Arc<SharedState>) -> anyhow::Result<Self> {
        let update_topic = format!("$aws/things/{}/shadow/update", THING_NAME);
        let delta_topic = format!("{}/delta", update_topic);

        let config = MqttClientConfiguration {
            client_id: Some(THING_NAME),
            ..Default::default()
        };
        let (client, connection) = EspMqttClient::new(MQTT_URL, &config)?;

        let topic = delta_topic.clone();
        crate::tasks::spawn("mqtt-events", STACK_MQTT_EVENTS, move || {
            drain_events(connection, &topic, &state)
        })?;

        log::info!("MQTT client started for {} at {}", THING_NAME, MQTT_URL);
        Ok(Self {
            client,
            update_topic,
            delta_topic,
            subscribed: false,
        })
    }

    fn ensure_subscribed(&mut self) {
        if self.subscribed {
            return;
        }
        match self.client.subscribe(&self.delta_topic, QoS::AtMostOnce) {
            Ok(_) => {
                log::info!("Subscribed to {}", self.delta_topic);
                self.subscribed = true;
            }
            Err(e) => log::warn!("Delta subscription failed, will retry: {}", e),
        }
    }
}

impl CloudSync for ShadowMqtt {
    fn report(&mut self, report: &ShadowReport) -> anyhow::Result<()> {
        self.ensure_subscribed();

        let doc = report.to_document()?;
        self.client
            .publish(&self.update_topic, QoS::AtLeastOnce, false, &doc)?;
        Ok(())
    }
}

fn drain_events(mut connection: EspMqttConnection, delta_topic: &str, state: &SharedState) {
    log::info!("MQTT event loop started");

    while let Ok(event) = connection.next() {
        match event.payload() {
            EventPayload::Received { topic, data, .. } if topic == Some(delta_topic) => {
                if let Some(status) = parse_delta(data) {
                    log::info!("hqiStatus set to {} by shadow delta", status);
                    state.set_hqi_status(status);
                }
            }
            EventPayload::Connected(_) => log::info!("MQTT connected"),
            EventPayload::Disconnected => log::warn!("MQTT disconnected"),
            EventPayload::Error(e) => log::warn!("MQTT error: {:?}", e),
            _ => {}
        }
    }

    log::warn!("MQTT connection closed, event loop exiting");
}
