#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    #[error("Stream does not start with the fLaC marker. Read {0:#010X}")]
    BadMagicNumber(u32),

    #[error("No STREAMINFO block before the end of the metadata section")]
    MissingStreamInfo,

    #[error("STREAMINFO sample rate must be nonzero")]
    ZeroSampleRate,

    #[error("STREAMINFO block size bounds invalid: min {min}, max {max}")]
    BlockSizeBounds { min: u16, max: u16 },
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("Frame sync search ran off the end of the input")]
    SyncNotFound,

    #[error("Input exhausted in the middle of a frame")]
    OutOfData,

    #[error("Reserved block size code 0 in frame header")]
    BadBlockSizeCode,

    #[error("Reserved sample depth code {0} in frame header")]
    BadSampleDepth(u8),

    #[error("Reserved sample rate code 15 in frame header")]
    ReservedSampleRateCode,

    #[error("Reserved channel assignment {0} in frame header")]
    ReservedChannelAssignment(u8),

    #[error("Frame channel count does not match STREAMINFO: frame {frame}, stream {stream}")]
    ChannelCountMismatch { frame: u32, stream: u32 },

    #[error("Frame sample depth does not match STREAMINFO: frame {frame}, stream {stream}")]
    SampleDepthMismatch { frame: u32, stream: u32 },

    #[error("Frame sample rate does not match STREAMINFO: frame {frame} Hz, stream {stream} Hz")]
    SampleRateMismatch { frame: u32, stream: u32 },

    #[error("Frame block size {block_size} exceeds STREAMINFO maximum {max}")]
    BlockSizeOutOfRange { block_size: u32, max: u32 },

    #[error("Frame header CRC-8 mismatch. Calculated {calculated:#04X}, read {read:#04X}")]
    HeaderCrcMismatch { calculated: u8, read: u8 },

    #[error("Frame CRC-16 mismatch. Calculated {calculated:#06X}, read {read:#06X}")]
    FrameCrcMismatch { calculated: u16, read: u16 },
}

#[derive(thiserror::Error, Debug)]
pub enum SubframeError {
    #[error("Reserved subframe type {0}")]
    ReservedSubframeType(u8),

    #[error("Fixed prediction order must be <= 4. Read {0}")]
    BadFixedPredictionOrder(u8),

    #[error("Reserved residual coding method {0}")]
    ReservedResidualCodingMethod(u8),

    #[error("Block size {block_size} is not divisible into {partitions} Rice partitions")]
    BlockSizeNotDivisibleByRicePartitions { block_size: u32, partitions: u32 },

    #[error(
        "First Rice partition holds {partition_len} samples, fewer than {warm_up} warm-up samples"
    )]
    PartitionShorterThanWarmUp { partition_len: u32, warm_up: u32 },

    #[error("Wasted bits count {wasted} leaves no sample bits at depth {depth}")]
    WastedBitsTooLarge { wasted: u32, depth: u32 },
}
