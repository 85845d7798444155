// Copyright 2026 foyer Project Authors
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

use std::{borrow::Cow, collections::HashMap, sync::Arc};

use itertools::Itertools;
use parking_lot::Mutex;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec, Registry,
};

use crate::{
    metrics::{
        BoxedCounter, BoxedCounterVec, BoxedGauge, BoxedGaugeVec, Boxer, CounterOps, CounterVecOps, GaugeOps,
        GaugeVecOps, RegistryOps,
    },
    scope::Scope,
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
    fn counter(&self, labels: &[Cow<'static, str>]) -> BoxedCounter {
        let labels = labels.iter().map(Cow::as_ref).collect_vec();
        self.with_label_values(labels.as_slice()).boxed()
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
    fn gauge(&self, labels: &[Cow<'static, str>]) -> BoxedGauge {
        let labels = labels.iter().map(Cow::as_ref).collect_vec();
        self.with_label_values(labels.as_slice()).boxed()
    }
}

/// Prometheus metric registry with lib `prometheus`.
///
/// The [`PrometheusMetricsRegistry`] can be cloned and shared by multiple caches. A metric vector registered twice
/// with the same name is reused instead of being registered again.
#[derive(Debug, Clone)]
pub struct PrometheusMetricsRegistry {
    registry: Registry,
    vecs: Arc<Mutex<HashMap<&'static str, MetricVec>>>,
}

impl PrometheusMetricsRegistry {
    /// Create an Prometheus metrics registry.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
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
        let vec = self.vecs.lock().with(|mut vecs| {
            vecs.entry(name)
                .or_insert_with(|| {
                    MetricVec::Counter(
                        register_int_counter_vec_with_registry!(name, desc, label_names, self.registry)
                            .expect("metric name and labels must be valid"),
                    )
                })
                .clone()
        });
        match vec {
            MetricVec::Counter(v) => v.boxed(),
            MetricVec::Gauge(_) => panic!("metric {name} has been registered as a gauge vector"),
        }
    }

    fn register_gauge_vec(
        &self,
        name: &'static str,
        desc: &'static str,
        label_names: &'static [&'static str],
    ) -> BoxedGaugeVec {
        let vec = self.vecs.lock().with(|mut vecs| {
            vecs.entry(name)
                .or_insert_with(|| {
                    MetricVec::Gauge(
                        register_int_gauge_vec_with_registry!(name, desc, label_names, self.registry)
                            .expect("metric name and labels must be valid"),
                    )
                })
                .clone()
        });
        match vec {
            MetricVec::Gauge(v) => v.boxed(),
            MetricVec::Counter(_) => panic!("metric {name} has been registered as a counter vector"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(registry: &PrometheusMetricsRegistry) {
        let cv = registry.register_counter_vec("test_counter_1", "test counter 1", &["label1", "label2"]);
        let c = cv.counter(&["l1".into(), "l2".into()]);
        c.increase(42);

        let gv = registry.register_gauge_vec("test_gauge_1", "test gauge 1", &["label1", "label2"]);
        let g = gv.gauge(&["l1".into(), "l2".into()]);
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
    }
}
