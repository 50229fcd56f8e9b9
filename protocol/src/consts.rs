//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Wire-level constants for the job-dispatch protocol

/// Magic prefix of packets travelling toward the broker (`\0REQ`).
pub const REQ_MAGIC: u32 = 0x0052_4551;

/// Magic prefix of packets travelling from the broker (`\0RES`).
pub const RES_MAGIC: u32 = 0x0052_4553;

/// Fixed packet header length: magic, command code, payload length.
pub const HEADER_LEN: usize = 12;

/// Default TCP port the broker listens on.
pub const DEFAULT_PORT: u16 = 4730;

/// Upper bound on a single packet payload. Anything larger is treated as a
/// protocol error rather than buffered.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Upper bound on an admin text line before a newline must appear.
pub const MAX_ADMIN_LINE_LEN: usize = 1024;

/// Argument separator inside a packet payload.
pub const ARG_SEPARATOR: u8 = 0x00;

/// Binary command codes.
pub mod command {
    /// Worker advertises an ability (function name).
    pub const CAN_DO: u32 = 1;
    /// Worker withdraws an ability.
    pub const CANT_DO: u32 = 2;
    /// Worker withdraws every ability at once.
    pub const RESET_ABILITIES: u32 = 3;
    /// Worker announces it is about to sleep until woken.
    pub const PRE_SLEEP: u32 = 4;
    /// Broker wake-up for a sleeping worker.
    pub const NOOP: u32 = 6;
    /// Client submits a normal-priority job.
    pub const SUBMIT_JOB: u32 = 7;
    /// Broker acknowledges a submission with the job handle.
    pub const JOB_CREATED: u32 = 8;
    /// Worker asks for a queued job.
    pub const GRAB_JOB: u32 = 9;
    /// Broker has nothing queued for the worker's abilities.
    pub const NO_JOB: u32 = 10;
    /// Broker hands a job to a worker.
    pub const JOB_ASSIGN: u32 = 11;
    /// Worker reports a successful result.
    pub const WORK_COMPLETE: u32 = 13;
    /// Worker reports failure.
    pub const WORK_FAIL: u32 = 14;
    /// Echo request, answered verbatim.
    pub const ECHO_REQ: u32 = 16;
    /// Echo response.
    pub const ECHO_RES: u32 = 17;
    /// Client submits a background job (no completion forwarded).
    pub const SUBMIT_JOB_BG: u32 = 18;
    /// Client submits a high-priority job.
    pub const SUBMIT_JOB_HIGH: u32 = 21;
    /// Connection labels itself for the admin `workers` listing.
    pub const SET_CLIENT_ID: u32 = 22;
    /// Worker advertises an ability with an execution timeout in seconds.
    pub const CAN_DO_TIMEOUT: u32 = 23;
}
