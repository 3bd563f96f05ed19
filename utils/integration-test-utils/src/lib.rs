/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod in_memory_broker;
mod in_memory_destination_source;
mod integration_test_utils;
mod pipeline_doubles;

pub use in_memory_broker::InMemoryBroker;
pub use in_memory_destination_source::InMemoryDestinationSource;
pub use integration_test_utils::{check_tracking_ids_in_order, eventually, init_logging};
pub use pipeline_doubles::{EmittedRecord, FieldSelector, JsonMessageBuilder, RecordingCollector};
