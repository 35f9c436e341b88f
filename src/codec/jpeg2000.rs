//! JPEG 2000 code stream compression through OpenJPEG.
//!
//! Rasters are carried as a single grayscale component whose precision
//! is the pixel depth; encoding is reversible (lossless 5/3 wavelet)
//! so scaled integer grids survive the round trip bit-exactly.

use std::os::raw::c_void;
use std::ptr::NonNull;

use openjpeg_sys as opj;

struct Codec(NonNull<opj::opj_codec_t>);

impl Drop for Codec {
    fn drop(&mut self) {
        unsafe {
            opj::opj_destroy_codec(self.0.as_ptr());
        }
    }
}

impl Codec {
    fn j2k_encoder() -> Result<Self, String> {
        NonNull::new(unsafe { opj::opj_create_compress(opj::OPJ_CODEC_FORMAT::OPJ_CODEC_J2K) })
            .map(Self)
            .ok_or_else(|| "setup of the encoder codec failed".to_owned())
    }

    fn j2k_decoder() -> Result<Self, String> {
        NonNull::new(unsafe { opj::opj_create_decompress(opj::OPJ_CODEC_FORMAT::OPJ_CODEC_J2K) })
            .map(Self)
            .ok_or_else(|| "setup of the decoder codec failed".to_owned())
    }

    fn as_ptr(&self) -> *mut opj::opj_codec_t {
        self.0.as_ptr()
    }
}

struct Image(NonNull<opj::opj_image_t>);

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            opj::opj_image_destroy(self.0.as_ptr());
        }
    }
}

impl Image {
    fn new(ptr: *mut opj::opj_image_t) -> Result<Self, String> {
        NonNull::new(ptr)
            .map(Self)
            .ok_or_else(|| "initialization of the JPEG 2000 image failed".to_owned())
    }

    fn inner(&self) -> &opj::opj_image_t {
        unsafe { &(*self.0.as_ptr()) }
    }

    fn components(&self) -> &[opj::opj_image_comp_t] {
        let img = self.inner();
        unsafe { std::slice::from_raw_parts(img.comps, img.numcomps as usize) }
    }

    fn as_ptr(&self) -> *mut opj::opj_image_t {
        self.0.as_ptr()
    }
}

struct Stream(*mut opj::opj_stream_t);

impl Drop for Stream {
    fn drop(&mut self) {
        unsafe {
            opj::opj_stream_destroy(self.0);
        }
    }
}

impl Stream {
    /// Builds an input stream reading from `buf`.
    fn from_bytes(buf: &[u8]) -> Result<Self, String> {
        struct SliceWithOffset<'a> {
            buf: &'a [u8],
            offset: usize,
        }

        unsafe extern "C" fn free_user_data_fn(p_user_data: *mut c_void) {
            drop(Box::from_raw(p_user_data as *mut SliceWithOffset))
        }

        unsafe extern "C" fn read_fn(
            p_buffer: *mut c_void,
            p_nb_bytes: usize,
            p_user_data: *mut c_void,
        ) -> usize {
            if p_buffer.is_null() {
                return 0;
            }
            let user_data = &mut *(p_user_data as *mut SliceWithOffset);
            let remaining = user_data.buf.len() - user_data.offset;
            let len = remaining.min(p_nb_bytes);
            if len == 0 {
                return usize::MAX; // OPJ end-of-stream marker
            }
            let src = user_data.buf[user_data.offset..].as_ptr();
            std::ptr::copy_nonoverlapping(src, p_buffer as *mut u8, len);
            user_data.offset += len;
            len
        }

        unsafe extern "C" fn skip_fn(p_nb_bytes: i64, p_user_data: *mut c_void) -> i64 {
            let user_data = &mut *(p_user_data as *mut SliceWithOffset);
            let remaining = user_data.buf.len() - user_data.offset;
            let len = remaining.min(p_nb_bytes as usize);
            user_data.offset += len;
            len as i64
        }

        unsafe extern "C" fn seek_fn(p_nb_bytes: i64, p_user_data: *mut c_void) -> i32 {
            let user_data = &mut *(p_user_data as *mut SliceWithOffset);
            if p_nb_bytes < 0 || p_nb_bytes as usize > user_data.buf.len() {
                return 0;
            }
            user_data.offset = p_nb_bytes as usize;
            1
        }

        let ptr = unsafe { opj::opj_stream_default_create(1) };
        if ptr.is_null() {
            return Err("setup of the input stream failed".to_owned());
        }
        let stream = Self(ptr);
        let len = buf.len() as u64;
        let user_data = Box::into_raw(Box::new(SliceWithOffset { buf, offset: 0 }));
        unsafe {
            opj::opj_stream_set_user_data(ptr, user_data as *mut c_void, Some(free_user_data_fn));
            opj::opj_stream_set_user_data_length(ptr, len);
            opj::opj_stream_set_read_function(ptr, Some(read_fn));
            opj::opj_stream_set_skip_function(ptr, Some(skip_fn));
            opj::opj_stream_set_seek_function(ptr, Some(seek_fn));
        }
        Ok(stream)
    }
}

struct WriteSink {
    buf: Vec<u8>,
    pos: usize,
}

/// Builds an output stream backed by a heap sink; returns the stream
/// and a raw pointer for reading the sink back after compression. The
/// stream owns the sink and frees it on destruction.
fn output_stream() -> Result<(Stream, *mut WriteSink), String> {
    unsafe extern "C" fn free_user_data_fn(p_user_data: *mut c_void) {
        drop(Box::from_raw(p_user_data as *mut WriteSink))
    }

    unsafe extern "C" fn write_fn(
        p_buffer: *mut c_void,
        p_nb_bytes: usize,
        p_user_data: *mut c_void,
    ) -> usize {
        if p_buffer.is_null() {
            return 0;
        }
        let sink = &mut *(p_user_data as *mut WriteSink);
        let end = sink.pos + p_nb_bytes;
        if end > sink.buf.len() {
            sink.buf.resize(end, 0);
        }
        let src = std::slice::from_raw_parts(p_buffer as *const u8, p_nb_bytes);
        sink.buf[sink.pos..end].copy_from_slice(src);
        sink.pos = end;
        p_nb_bytes
    }

    unsafe extern "C" fn skip_fn(p_nb_bytes: i64, p_user_data: *mut c_void) -> i64 {
        let sink = &mut *(p_user_data as *mut WriteSink);
        let end = sink.pos + p_nb_bytes as usize;
        if end > sink.buf.len() {
            sink.buf.resize(end, 0);
        }
        sink.pos = end;
        p_nb_bytes
    }

    unsafe extern "C" fn seek_fn(p_nb_bytes: i64, p_user_data: *mut c_void) -> i32 {
        let sink = &mut *(p_user_data as *mut WriteSink);
        if p_nb_bytes < 0 {
            return 0;
        }
        let end = p_nb_bytes as usize;
        if end > sink.buf.len() {
            sink.buf.resize(end, 0);
        }
        sink.pos = end;
        1
    }

    let ptr = unsafe { opj::opj_stream_default_create(0) };
    if ptr.is_null() {
        return Err("setup of the output stream failed".to_owned());
    }
    let stream = Stream(ptr);
    let sink = Box::into_raw(Box::new(WriteSink {
        buf: Vec::new(),
        pos: 0,
    }));
    unsafe {
        opj::opj_stream_set_user_data(ptr, sink as *mut c_void, Some(free_user_data_fn));
        opj::opj_stream_set_write_function(ptr, Some(write_fn));
        opj::opj_stream_set_skip_function(ptr, Some(skip_fn));
        opj::opj_stream_set_seek_function(ptr, Some(seek_fn));
    }
    Ok((stream, sink))
}

pub(crate) fn encode(
    raster: &[u8],
    width: usize,
    height: usize,
    depth: usize,
    out: &mut Vec<u8>,
) -> Result<(), String> {
    if !matches!(depth, 8 | 16 | 24) {
        return Err(format!("unsupported JPEG 2000 pixel depth: {depth}"));
    }
    let bytes_per_sample = depth / 8;
    if raster.len() != width * height * bytes_per_sample {
        return Err("raster size does not match its dimensions".to_owned());
    }

    let mut params = unsafe { std::mem::zeroed::<opj::opj_cparameters>() };
    unsafe { opj::opj_set_default_encoder_parameters(&mut params as *mut _) };
    // Single quality layer at rate 1 selects lossless coding.
    params.tcp_numlayers = 1;
    params.tcp_rates[0] = 1.0;
    params.cp_disto_alloc = 1;
    params.irreversible = 0;
    let min_extent = width.min(height) as i64;
    while params.numresolution > 1 && min_extent < (1i64 << (params.numresolution - 1)) {
        params.numresolution -= 1;
    }

    let mut cmptparm = unsafe { std::mem::zeroed::<opj::opj_image_cmptparm_t>() };
    cmptparm.dx = 1;
    cmptparm.dy = 1;
    cmptparm.w = width as u32;
    cmptparm.h = height as u32;
    cmptparm.prec = depth as u32;
    cmptparm.bpp = depth as u32;
    cmptparm.sgnd = 0;

    let image = Image::new(unsafe {
        opj::opj_image_create(1, &mut cmptparm, opj::OPJ_COLOR_SPACE::OPJ_CLRSPC_GRAY)
    })?;
    {
        let inner = unsafe { &mut (*image.as_ptr()) };
        inner.x0 = 0;
        inner.y0 = 0;
        inner.x1 = width as u32;
        inner.y1 = height as u32;
    }

    let comp = &image.components()[0];
    let data = unsafe { std::slice::from_raw_parts_mut(comp.data, width * height) };
    for (sample, chunk) in data.iter_mut().zip(raster.chunks_exact(bytes_per_sample)) {
        let mut v = 0i32;
        for octet in chunk {
            v = (v << 8) | i32::from(*octet);
        }
        *sample = v;
    }

    let codec = Codec::j2k_encoder()?;
    if unsafe { opj::opj_setup_encoder(codec.as_ptr(), &mut params, image.as_ptr()) } != 1 {
        return Err("setup of the openjpeg encoder failed".to_owned());
    }

    let (stream, sink) = output_stream()?;
    let ok = unsafe {
        opj::opj_start_compress(codec.as_ptr(), image.as_ptr(), stream.0) == 1
            && opj::opj_encode(codec.as_ptr(), stream.0) == 1
            && opj::opj_end_compress(codec.as_ptr(), stream.0) == 1
    };
    if !ok {
        return Err("encoding of the JPEG 2000 code stream failed".to_owned());
    }

    out.extend_from_slice(unsafe { &(*sink).buf });
    Ok(())
}

pub(crate) fn decode(stream_bytes: &[u8]) -> Result<Vec<u8>, String> {
    let codec = Codec::j2k_decoder()?;

    let mut params = unsafe { std::mem::zeroed::<opj::opj_dparameters>() };
    unsafe { opj::opj_set_default_decoder_parameters(&mut params as *mut _) };
    if unsafe { opj::opj_setup_decoder(codec.as_ptr(), &mut params) } != 1 {
        return Err("setup of the openjpeg decoder failed".to_owned());
    }

    let stream = Stream::from_bytes(stream_bytes)?;

    let mut img: *mut opj::opj_image_t = std::ptr::null_mut();
    if unsafe { opj::opj_read_header(stream.0, codec.as_ptr(), &mut img) } != 1 {
        return Err("reading of the JPEG 2000 image header failed".to_owned());
    }
    let image = Image::new(img)?;

    if unsafe { opj::opj_decode(codec.as_ptr(), stream.0, image.as_ptr()) } != 1 {
        return Err("decoding of the JPEG 2000 image failed".to_owned());
    }

    if let [comp_gray] = image.components() {
        let len = (comp_gray.w * comp_gray.h) as usize;
        let bytes_per_sample = (comp_gray.prec as usize).div_ceil(8);
        let samples = unsafe { std::slice::from_raw_parts(comp_gray.data, len) };
        let mut out = Vec::with_capacity(len * bytes_per_sample);
        for sample in samples {
            let be = sample.to_be_bytes();
            out.extend_from_slice(&be[4 - bytes_per_sample..]);
        }
        Ok(out)
    } else {
        Err("unexpected non-gray-scale image components".to_owned())
    }
}
