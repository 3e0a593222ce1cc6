// Copyright 2026 refcache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use prometheus::{IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

use crate::metrics::{
    BoxedCounter, BoxedCounterVec, BoxedGauge, BoxedGaugeVec, Boxer, CounterOps, CounterVecOps, GaugeOps, GaugeVecOps,
    RegistryOps,
};

#[derive(Debug, Clone)]
enum MetricVec {
    Counter(IntCounterVec),
    Gauge(IntGaugeVec),
}

impl CounterOps for IntCounter {
    fn increase(&self, val: u64) {
        self.inc_by(val);
    }
}

impl CounterVecOps for IntCounterVec {
    fn counter(&self, labels: &[&str]) -> BoxedCounter {
        self.with_label_values(labels).boxed()
    }
}

impl GaugeOps for IntGauge {
    fn increase(&self, val: u64) {
        self.add(val as _);
    }

    fn decrease(&self, val: u64) {
        self.sub(val as _);
    }

    fn absolute(&self, val: u64) {
        self.set(val as _);
    }
}

impl GaugeVecOps for IntGaugeVec {
    fn gauge(&self, labels: &[&str]) -> BoxedGauge {
        self.with_label_values(labels).boxed()
    }
}

/// Prometheus metric registry with lib `prometheus`.
///
/// The [`PrometheusMetricsRegistry`] can be cloned and shared by multiple caches. Metric vectors are registered
/// once per registry and handed out again on later registrations with the same name, so caches with different
/// names can report into the same vectors.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsRegistry {
    registry: Arc<Registry>,
    vecs: Arc<Mutex<HashMap<&'static str, MetricVec>>>,
}

impl PrometheusMetricsRegistry {
    /// Create an Prometheus metrics registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            vecs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the wrapped prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl RegistryOps for PrometheusMetricsRegistry {
    fn register_counter_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> BoxedCounterVec {
        let mut vecs = self.vecs.lock();
        let vec = vecs.entry(name).or_insert_with(|| {
            let vec = IntCounterVec::new(Opts::new(name, desc), label_names).expect("invalid counter vec options");
            self.registry
                .register(Box::new(vec.clone()))
                .expect("counter vec must not be registered twice");
            MetricVec::Counter(vec)
        });
        match vec {
            MetricVec::Counter(v) => v.clone().boxed(),
            MetricVec::Gauge(_) => panic!("metric {name} is already registered as a gauge vec"),
        }
    }

    fn register_gauge_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> BoxedGaugeVec {
        let mut vecs = self.vecs.lock();
        let vec = vecs.entry(name).or_insert_with(|| {
            let vec = IntGaugeVec::new(Opts::new(name, desc), label_names).expect("invalid gauge vec options");
            self.registry
                .register(Box::new(vec.clone()))
                .expect("gauge vec must not be registered twice");
            MetricVec::Gauge(vec)
        });
        match vec {
            MetricVec::Gauge(v) => v.clone().boxed(),
            MetricVec::Counter(_) => panic!("metric {name} is already registered as a counter vec"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(registry: &PrometheusMetricsRegistry) {
        let cv = registry.register_counter_vec("test_counter_1", "test counter 1", &["label1", "label2"]);
        let c = cv.counter(&["l1", "l2"]);
        c.increase(42);

        let gv = registry.register_gauge_vec("test_gauge_1", "test gauge 1", &["label1", "label2"]);
        let g = gv.gauge(&["l1", "l2"]);
        g.increase(514);
        g.decrease(114);
        g.absolute(114514);
    }

    #[test]
    fn test_prometheus_metrics_registry() {
        let p8s = PrometheusMetricsRegistry::new(Registry::new());
        case(&p8s);
        assert_eq!(p8s.registry().gather().len(), 2);
    }

    #[test]
    fn test_shared_prometheus_metrics_registry() {
        let p8s1 = PrometheusMetricsRegistry::new(Registry::new());
        let p8s2 = p8s1.clone();
        case(&p8s1);
        case(&p8s2);
        assert_eq!(p8s1.registry().gather().len(), 2);
    }

    #[should_panic]
    #[test]
    fn test_duplicated_prometheus_metrics_registry_wrongly() {
        let registry = Registry::new();
        let p8s1 = PrometheusMetricsRegistry::new(registry.clone());
        let p8s2 = PrometheusMetricsRegistry::new(registry);
        case(&p8s1);
        case(&p8s2);
    }
}
