// Copyright 2026 BadCompany
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

//! Line-delimited JSON-RPC framing.
//!
//! One UTF-8 JSON object per LF-terminated line. A size cap protects the
//! gateway against unbounded buffering; blank lines are skipped.

use crate::engine_core::constants::limits;
use crate::engine_core::models::{JsonRpcRequest, JsonRpcResponse};
use anyhow::{anyhow, Context, Result};
use bytes::BytesMut;
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

pub struct LineCodec;

impl LineCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Value;
    type Error = anyhow::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            let Some(newline) = src.iter().position(|b| *b == b'\n') else {
                if src.len() as u64 > limits::MAX_MESSAGE_SIZE_BYTES {
                    return Err(anyhow!(
                        "line exceeds size limit of {} bytes",
                        limits::MAX_MESSAGE_SIZE_BYTES
                    ));
                }
                return Ok(None);
            };

            let line = src.split_to(newline + 1);
            if line.len() as u64 > limits::MAX_MESSAGE_SIZE_BYTES {
                return Err(anyhow!(
                    "line exceeds size limit of {} bytes",
                    limits::MAX_MESSAGE_SIZE_BYTES
                ));
            }

            let text = std::str::from_utf8(&line)
                .context("invalid UTF-8 in frame")?
                .trim();
            if text.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(text).context("invalid JSON frame")?;
            trace!("decoded frame: {value}");
            return Ok(Some(value));
        }
    }
}

impl<'a> Encoder<&'a JsonRpcRequest> for LineCodec {
    type Error = anyhow::Error;
    fn encode(&mut self, item: &'a JsonRpcRequest, dst: &mut BytesMut) -> Result<()> {
        let body = serde_json::to_vec(item)?;
        dst.extend_from_slice(&body);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

impl<'a> Encoder<&'a JsonRpcResponse> for LineCodec {
    type Error = anyhow::Error;
    fn encode(&mut self, item: &'a JsonRpcResponse, dst: &mut BytesMut) -> Result<()> {
        let body = serde_json::to_vec(item)?;
        dst.extend_from_slice(&body);
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}
